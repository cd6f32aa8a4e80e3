use crate::error::{Error, Result};

/// Natural cubic spline through tabulated points.
///
/// Piecewise cubic S(x) = a + b(x-xi) + c(x-xi)² + d(x-xi)³ with zero second
/// derivative at both ends. Built once per table and evaluated many times;
/// construction is O(n) (Thomas algorithm), evaluation O(log n).
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Build the spline. `x` must be strictly increasing, with at least two
    /// points and the same length as `y`.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::domain(format!(
                "spline abscissa has {} values but ordinate has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(Error::domain("spline needs at least 2 points"));
        }
        if let Some(i) = (1..x.len()).find(|&i| !(x[i] > x[i - 1])) {
            return Err(Error::domain(format!(
                "spline abscissa not strictly increasing at index {i} ({} after {})",
                x[i],
                x[i - 1]
            )));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(Error::domain("spline input contains non-finite values"));
        }

        let n = x.len();
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

        let mut alpha = vec![0.0; n];
        for i in 1..n - 1 {
            alpha[i] = (3.0 / h[i]) * (y[i + 1] - y[i]) - (3.0 / h[i - 1]) * (y[i] - y[i - 1]);
        }

        // Tridiagonal solve for the second-derivative coefficients
        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0.0; n];
        let mut coeffs = vec![[0.0; 4]; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        Ok(Self {
            x: x.to_vec(),
            coeffs,
        })
    }

    /// Interval on which the spline is defined.
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Tabulated abscissae; the spline is a single cubic between neighbours.
    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    pub fn contains(&self, x: f64) -> bool {
        let (lo, hi) = self.domain();
        x >= lo && x <= hi
    }

    /// Evaluate at `x`. Outside the domain the end value is returned; callers
    /// that must not extrapolate check [`CubicSpline::contains`] first.
    pub fn evaluate(&self, x: f64) -> f64 {
        let (lo, hi) = self.domain();
        if x <= lo {
            return self.coeffs[0][0];
        }
        if x >= hi {
            let [a, b, c, d] = self.coeffs[self.coeffs.len() - 1];
            let dx = hi - self.x[self.x.len() - 2];
            return a + dx * (b + dx * (c + dx * d));
        }

        let seg = self.segment(x);
        let [a, b, c, d] = self.coeffs[seg];
        let dx = x - self.x[seg];
        a + dx * (b + dx * (c + dx * d))
    }

    fn segment(&self, x: f64) -> usize {
        // partition_point gives the first knot > x; the segment starts one before
        let idx = self.x.partition_point(|&xi| xi <= x);
        idx.saturating_sub(1).min(self.coeffs.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_passes_through_knots() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.5];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let spline = CubicSpline::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            assert_relative_eq!(spline.evaluate(*xi), *yi, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear_data_is_reproduced_exactly() {
        let x = [0.0, 0.5, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let spline = CubicSpline::new(&x, &y).unwrap();
        assert_relative_eq!(spline.evaluate(1.25), 3.5, epsilon = 1e-12);
        assert_relative_eq!(spline.evaluate(2.7), 6.4, epsilon = 1e-12);
    }

    #[test]
    fn test_smooth_function_accuracy() {
        let x: Vec<f64> = (0..=40).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let spline = CubicSpline::new(&x, &y).unwrap();
        assert_relative_eq!(spline.evaluate(1.234), 1.234f64.sin(), epsilon = 1e-4);
    }

    #[test]
    fn test_two_points() {
        let spline = CubicSpline::new(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert_relative_eq!(spline.evaluate(2.0), 4.0, epsilon = 1e-12);
        assert_eq!(spline.domain(), (1.0, 3.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(CubicSpline::new(&[0.0], &[1.0]).is_err());
        assert!(CubicSpline::new(&[0.0, 1.0], &[1.0]).is_err());
        assert!(CubicSpline::new(&[0.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(CubicSpline::new(&[0.0, 1.0], &[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_evaluation_outside_domain_holds_end_values() {
        let spline = CubicSpline::new(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0]).unwrap();
        assert!(!spline.contains(2.5));
        assert!(spline.contains(2.0));
        assert_eq!(spline.evaluate(2.5), spline.evaluate(2.0));
        assert_eq!(spline.evaluate(-1.0), 0.0);
    }
}
