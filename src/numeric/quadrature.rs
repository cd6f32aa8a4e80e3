use crate::error::{Error, Result};

// 15-point Kronrod abscissae on [-1, 1] (non-negative half). Odd entries
// (1, 3, 5, 7) are the embedded 7-point Gauss nodes.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// Adaptive Gauss–Kronrod (7/15) integrator with global subdivision.
///
/// The interval with the largest error estimate is bisected until the summed
/// estimate drops below `max(abs_tol, rel_tol·|I|)` or the interval budget is
/// exhausted, which is reported as [`Error::Numerical`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrature {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_intervals: usize,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self {
            abs_tol: 0.0,
            rel_tol: 1e-10,
            max_intervals: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
    abs_value: f64,
}

impl Quadrature {
    /// Integrate `f` over `[a, b]`. Reversed limits flip the sign; an empty
    /// interval integrates to zero.
    pub fn integrate<F>(&self, mut f: F, a: f64, b: f64) -> Result<f64>
    where
        F: FnMut(f64) -> f64,
    {
        if !a.is_finite() || !b.is_finite() {
            return Err(Error::numerical(format!(
                "integration limits must be finite, got [{a}, {b}]"
            )));
        }
        if a == b {
            return Ok(0.0);
        }
        if a > b {
            return self.integrate(f, b, a).map(|v| -v);
        }

        let mut segments = vec![kronrod_segment(&mut f, a, b)];

        loop {
            let total: f64 = segments.iter().map(|s| s.value).sum();
            let error: f64 = segments.iter().map(|s| s.error).sum();
            let abs_total: f64 = segments.iter().map(|s| s.abs_value).sum();

            if !total.is_finite() || !error.is_finite() {
                return Err(Error::numerical(format!(
                    "non-finite integrand on [{a:e}, {b:e}]"
                )));
            }

            let roundoff = 50.0 * f64::EPSILON * abs_total;
            let tolerance = self.abs_tol.max(self.rel_tol * total.abs()).max(roundoff);
            if error <= tolerance {
                return Ok(total);
            }
            if segments.len() >= self.max_intervals {
                return Err(Error::numerical(format!(
                    "quadrature on [{a:e}, {b:e}] did not converge within {} intervals \
                     (estimate {total:e}, error {error:e})",
                    self.max_intervals
                )));
            }

            let worst = segments
                .iter()
                .enumerate()
                .max_by(|(_, l), (_, r)| l.error.total_cmp(&r.error))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let seg = segments.swap_remove(worst);
            let mid = 0.5 * (seg.a + seg.b);
            if mid <= seg.a || mid >= seg.b {
                // interval can no longer be split in floating point
                return Err(Error::numerical(format!(
                    "quadrature on [{a:e}, {b:e}] hit floating-point resolution at {mid:e}"
                )));
            }
            segments.push(kronrod_segment(&mut f, seg.a, mid));
            segments.push(kronrod_segment(&mut f, mid, seg.b));
        }
    }
}

/// Integrate with the default tolerances.
pub fn integrate<F>(f: F, a: f64, b: f64) -> Result<f64>
where
    F: FnMut(f64) -> f64,
{
    Quadrature::default().integrate(f, a, b)
}

fn kronrod_segment<F>(f: &mut F, a: f64, b: f64) -> Segment
where
    F: FnMut(f64) -> f64,
{
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);

    let fc = f(center);
    let mut kronrod = WGK[7] * fc;
    let mut gauss = WG[3] * fc;
    let mut abs_value = WGK[7] * fc.abs();

    for (j, &x) in XGK.iter().take(7).enumerate() {
        let dx = half * x;
        let f1 = f(center - dx);
        let f2 = f(center + dx);
        kronrod += WGK[j] * (f1 + f2);
        abs_value += WGK[j] * (f1.abs() + f2.abs());
        if j % 2 == 1 {
            gauss += WG[j / 2] * (f1 + f2);
        }
    }

    Segment {
        a,
        b,
        value: kronrod * half,
        error: ((kronrod - gauss) * half).abs(),
        abs_value: abs_value * half.abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_exact() {
        let v = integrate(|x| 3.0 * x * x + 2.0 * x + 1.0, 0.0, 2.0).unwrap();
        assert_relative_eq!(v, 14.0, max_relative = 1e-14);
    }

    #[test]
    fn test_reversed_and_empty_limits() {
        let v = integrate(|x| x, 2.0, 0.0).unwrap();
        assert_relative_eq!(v, -2.0, max_relative = 1e-14);
        assert_eq!(integrate(|x| x, 1.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_peaked_integrand() {
        // narrow Gaussian, integral ≈ sqrt(pi)·w
        let w = 1e-3;
        let v = integrate(|x| (-(x / w).powi(2)).exp(), -1.0, 1.0).unwrap();
        assert_relative_eq!(v, std::f64::consts::PI.sqrt() * w, max_relative = 1e-9);
    }

    #[test]
    fn test_steep_power_law() {
        let v = integrate(|x| x.powf(-2.5), 1.0, 1e4).unwrap();
        let exact = (1.0 - 1e4f64.powf(-1.5)) / 1.5;
        assert_relative_eq!(v, exact, max_relative = 1e-9);
    }

    #[test]
    fn test_zero_integrand() {
        assert_eq!(integrate(|_| 0.0, 0.0, 10.0).unwrap(), 0.0);
    }

    #[test]
    fn test_budget_exhaustion_is_numerical_error() {
        let quad = Quadrature {
            abs_tol: 0.0,
            rel_tol: 1e-15,
            max_intervals: 3,
        };
        let res = quad.integrate(|x: f64| (1.0 / x).sin(), 1e-3, 1.0);
        assert!(matches!(res, Err(Error::Numerical(_))));
    }

    #[test]
    fn test_non_finite_limits() {
        assert!(integrate(|x| x, 0.0, f64::INFINITY).is_err());
    }
}
