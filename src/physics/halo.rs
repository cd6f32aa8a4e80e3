use std::f64::consts::PI;

use crate::config::HaloConfig;
use crate::error::{Error, Result};
use crate::numeric::special::erf;
use crate::units;

/// Truncated Maxwellian velocity distribution seen from a frame moving
/// with the bulk velocity relative to the halo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaloModel {
    /// Escape velocity in m/s.
    pub escape_velocity: f64,
    /// Bulk (observer) velocity in m/s.
    pub bulk_velocity: f64,
    /// Velocity dispersion in m/s.
    pub dispersion: f64,
    /// Local mass density in GeV/cm³.
    pub local_density_gev_cm3: f64,
    normalization: f64,
}

impl HaloModel {
    pub fn new(config: &HaloConfig) -> Result<Self> {
        let escape_velocity = units::km_per_s_to_m_per_s(config.escape_velocity_km_s);
        let bulk_velocity = units::km_per_s_to_m_per_s(config.bulk_velocity_km_s);
        let dispersion = units::km_per_s_to_m_per_s(config.velocity_dispersion_km_s);
        if !(bulk_velocity > 0.0 && dispersion > 0.0 && escape_velocity > 0.0) {
            return Err(Error::domain(format!(
                "halo velocities must be positive (escape {escape_velocity}, bulk {bulk_velocity}, \
                 dispersion {dispersion} m/s)"
            )));
        }

        let z = escape_velocity / dispersion;
        let normalization =
            erf(z / 2f64.sqrt()) - (2.0 / PI).sqrt() * z * (-0.5 * z * z).exp();
        if !(normalization > 0.0 && normalization.is_finite()) {
            return Err(Error::domain(format!(
                "halo normalisation evaluates to {normalization}"
            )));
        }

        Ok(Self {
            escape_velocity,
            bulk_velocity,
            dispersion,
            local_density_gev_cm3: config.local_density_gev_cm3,
            normalization,
        })
    }

    /// Normalisation of the truncated distribution (1 for an infinite
    /// escape velocity).
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    /// Mean inverse speed above `v_min` (m/s), in s/m.
    ///
    /// Both velocity branches are clamped to the escape velocity; the minus
    /// branch may be negative and is used as is. Tiny negative values from
    /// cancellation near the kinematic endpoint are clipped to zero.
    pub fn mean_inverse_speed(&self, v_min: f64) -> f64 {
        let v_esc = self.escape_velocity;
        let v_obs = self.bulk_velocity;
        let sigma = self.dispersion;

        let v_plus = (v_min + v_obs).min(v_esc);
        let v_minus = (v_min - v_obs).min(v_esc);
        let scale = 2f64.sqrt() * sigma;

        let erf_term = (erf(v_plus / scale) - erf(v_minus / scale)) / (2.0 * v_obs);
        let tail_term = (v_plus - v_minus) / ((2.0 * PI).sqrt() * v_obs * sigma)
            * (-v_esc * v_esc / (2.0 * sigma * sigma)).exp();

        ((erf_term - tail_term) / self.normalization).max(0.0)
    }

    /// Largest `v_min` with a non-zero inverse speed.
    pub fn max_speed(&self) -> f64 {
        self.escape_velocity + self.bulk_velocity
    }
}
