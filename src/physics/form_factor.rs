use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::numeric::special::spherical_j1;
use crate::units;

/// Skin thickness in fm.
const SKIN_THICKNESS_FM: f64 = 0.9;
/// Surface diffuseness in fm.
const DIFFUSENESS_FM: f64 = 0.52;

/// Helm form factor of a nucleus with `A` nucleons.
///
/// |F(q)|² = (3 j₁(q R₁) / (q R₁))² · exp(-q² s²)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelmFormFactor {
    /// Effective nuclear radius R₁ in fm.
    pub radius_fm: f64,
    /// Nuclide rest energy in GeV.
    pub nucleus_mass_gev: f64,
}

impl HelmFormFactor {
    pub fn new(mass_number: u32, nucleus_mass_kg: f64) -> Result<Self> {
        if mass_number == 0 || !(nucleus_mass_kg > 0.0) {
            return Err(Error::domain(format!(
                "form factor needs A > 0 and a positive mass (A = {mass_number}, M = {nucleus_mass_kg} kg)"
            )));
        }
        let c = 1.23 * (mass_number as f64).cbrt() - 0.6;
        let r1_sq = c * c + 7.0 / 3.0 * PI * PI * DIFFUSENESS_FM * DIFFUSENESS_FM
            - 5.0 * SKIN_THICKNESS_FM * SKIN_THICKNESS_FM;
        if !(r1_sq > 0.0) {
            return Err(Error::domain(format!(
                "Helm radius squared is {r1_sq} fm² for A = {mass_number}"
            )));
        }
        Ok(Self {
            radius_fm: r1_sq.sqrt(),
            nucleus_mass_gev: units::kg_to_gev(nucleus_mass_kg),
        })
    }

    /// Momentum transfer in 1/fm for a recoil energy in J.
    pub fn momentum_transfer_per_fm(&self, recoil_energy_j: f64) -> f64 {
        let e_gev = units::joules_to_gev(recoil_energy_j);
        (2.0 * self.nucleus_mass_gev * e_gev).sqrt() / units::HBAR_C_GEV_FM
    }

    /// |F|² at momentum transfer `q` (1/fm).
    pub fn squared_at_momentum(&self, q: f64) -> f64 {
        let x = q * self.radius_fm;
        let amplitude = if x.abs() < 1e-6 {
            1.0 - x * x / 10.0
        } else {
            3.0 * spherical_j1(x) / x
        };
        amplitude * amplitude * (-q * q * SKIN_THICKNESS_FM * SKIN_THICKNESS_FM).exp()
    }

    /// |F|² for a recoil energy in J.
    pub fn squared(&self, recoil_energy_j: f64) -> f64 {
        self.squared_at_momentum(self.momentum_transfer_per_fm(recoil_energy_j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sodium() -> HelmFormFactor {
        HelmFormFactor::new(23, units::amu_to_kg(22.99)).unwrap()
    }

    #[test]
    fn test_unity_at_zero_recoil() {
        assert_relative_eq!(sodium().squared(0.0), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_bounded_and_suppressed() {
        let ff = sodium();
        for i in 1..200 {
            let e = units::kev_to_joules(i as f64);
            let f2 = ff.squared(e);
            assert!((0.0..=1.0).contains(&f2), "F² = {f2} at {i} keV");
        }
        assert!(ff.squared(units::kev_to_joules(100.0)) < ff.squared(units::kev_to_joules(10.0)));
    }

    #[test]
    fn test_momentum_transfer() {
        // q = sqrt(2 M E) / ħc; 10 keV on a 21.4 GeV nucleus → ≈ 0.1048 /fm
        let ff = sodium();
        let q = ff.momentum_transfer_per_fm(units::kev_to_joules(10.0));
        let expected = (2.0 * ff.nucleus_mass_gev * 1e-5f64).sqrt() / units::HBAR_C_GEV_FM;
        assert_relative_eq!(q, expected, max_relative = 1e-12);
        assert_relative_eq!(q, 0.1048, epsilon = 1e-3);
    }

    #[test]
    fn test_hydrogen_radius_is_real() {
        let ff = HelmFormFactor::new(1, units::amu_to_kg(1.008)).unwrap();
        assert!(ff.radius_fm > 1.0);
    }
}
