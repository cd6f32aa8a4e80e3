use std::f64::consts::{PI, SQRT_2};

use scilib::math::basic;

/// Beyond this |x|, erf is ±1 to within 2e-8.
const ERF_SATURATION: f64 = 4.0;

/// Error function, saturated to ±1 in the far tails.
pub fn erf(x: f64) -> f64 {
    if x.abs() >= ERF_SATURATION {
        x.signum()
    } else {
        basic::erf(x)
    }
}

/// Density of the normal distribution N(`loc`, `scale`²) at `x`.
pub fn normal_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    (-0.5 * z * z).exp() / (scale * (2.0 * PI).sqrt())
}

/// Cumulative distribution of N(`loc`, `scale`²) at `x`.
pub fn normal_cdf(x: f64, loc: f64, scale: f64) -> f64 {
    0.5 * (1.0 + erf((x - loc) / (scale * SQRT_2)))
}

/// Spherical Bessel function of the first kind, order one.
pub fn spherical_j1(x: f64) -> f64 {
    if x.abs() < 1e-3 {
        let x2 = x * x;
        return x / 3.0 * (1.0 - x2 / 10.0 * (1.0 - x2 / 28.0));
    }
    x.sin() / (x * x) - x.cos() / x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_erf_reference_values() {
        assert_relative_eq!(erf(0.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(erf(0.5), 0.520_499_877_813_046_5, epsilon = 1e-10);
        assert_relative_eq!(erf(1.0), 0.842_700_792_949_714_9, epsilon = 1e-10);
        assert_relative_eq!(erf(2.0), 0.995_322_265_018_952_7, epsilon = 1e-10);
        assert_relative_eq!(erf(3.0), 0.999_977_909_503_001_4, epsilon = 1e-9);
        assert_relative_eq!(erf(-1.0), -0.842_700_792_949_714_9, epsilon = 1e-10);
    }

    #[test]
    fn test_erf_saturates_in_tails() {
        assert_eq!(erf(ERF_SATURATION), 1.0);
        assert_eq!(erf(25.0), 1.0);
        assert_eq!(erf(-25.0), -1.0);
        assert_eq!(erf(f64::INFINITY), 1.0);
        assert_relative_eq!(erf(ERF_SATURATION - 1e-9), 1.0, epsilon = 2e-8);
    }

    #[test]
    fn test_normal_distribution() {
        assert_relative_eq!(normal_cdf(0.0, 0.0, 1.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normal_cdf(1.0, 0.0, 1.0), 0.841_344_746_068_542_9, epsilon = 1e-10);
        assert_relative_eq!(normal_cdf(40.0, 30.0, 10.0), 0.841_344_746_068_542_9, epsilon = 1e-10);
        assert_eq!(normal_cdf(1000.0, 15.0, 30.0), 1.0);
        assert_eq!(normal_cdf(-1000.0, 15.0, 30.0), 0.0);
        assert_relative_eq!(normal_pdf(0.0, 0.0, 1.0), 0.398_942_280_401_432_7, epsilon = 1e-14);
        assert_relative_eq!(normal_pdf(5.0, 5.0, 2.0), 0.398_942_280_401_432_7 / 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_spherical_j1() {
        assert_eq!(spherical_j1(0.0), 0.0);
        assert_relative_eq!(spherical_j1(1.0), 0.301_168_678_939_756_8, epsilon = 1e-14);
        assert_relative_eq!(spherical_j1(5.0), -0.095_089_408_079_170_06, epsilon = 1e-14);
        // series and closed form agree across the switch
        let x: f64 = 0.999e-3;
        let closed = x.sin() / (x * x) - x.cos() / x;
        assert_relative_eq!(spherical_j1(x), closed, max_relative = 1e-6);
    }
}
