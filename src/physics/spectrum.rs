use crate::config::NuclideConfig;
use crate::data::model::{EnergyTrackMap, RateSample, RateSpectrum};
use crate::error::{Error, Result};
use crate::units;

use super::form_factor::HelmFormFactor;
use super::halo::HaloModel;

// ---------------------------------------------------------------------------
// Nuclide
// ---------------------------------------------------------------------------

/// Physical properties of one target nuclide.
#[derive(Debug, Clone, PartialEq)]
pub struct Nuclide {
    pub name: String,
    pub mass_number: u32,
    pub proton_number: u32,
    pub mass_kg: f64,
}

impl Nuclide {
    pub fn neutron_number(&self) -> Result<u32> {
        self.mass_number.checked_sub(self.proton_number).ok_or_else(|| {
            Error::domain(format!(
                "{}: proton number {} exceeds mass number {}",
                self.name, self.proton_number, self.mass_number
            ))
        })
    }
}

impl From<&NuclideConfig> for Nuclide {
    fn from(config: &NuclideConfig) -> Self {
        Self {
            name: config.name.clone(),
            mass_number: config.mass_number,
            proton_number: config.proton_number,
            mass_kg: units::amu_to_kg(config.mass_amu),
        }
    }
}

fn reduced_mass(a: f64, b: f64) -> Result<f64> {
    let mu = a * b / (a + b);
    if mu > 0.0 && mu.is_finite() {
        Ok(mu)
    } else {
        Err(Error::domain(format!(
            "reduced mass of {a:e} kg and {b:e} kg evaluates to {mu:e}"
        )))
    }
}

// ---------------------------------------------------------------------------
// SpectrumSynthesizer
// ---------------------------------------------------------------------------

/// Spin-independent elastic scattering spectrum of halo particles on one
/// nuclide, in events per kg per s per J (vs energy) or per m (vs track
/// length).
#[derive(Debug, Clone)]
pub struct SpectrumSynthesizer {
    nuclide: Nuclide,
    halo: HaloModel,
    form_factor: HelmFormFactor,
}

/// Quantities fixed for one hypothesis mass.
#[derive(Debug, Clone, Copy)]
struct MassTerms {
    nucleus_reduced_mass: f64,
    prefactor: f64,
}

impl SpectrumSynthesizer {
    pub fn new(nuclide: Nuclide, halo: HaloModel) -> Result<Self> {
        let form_factor = HelmFormFactor::new(nuclide.mass_number, nuclide.mass_kg)?;
        Ok(Self {
            nuclide,
            halo,
            form_factor,
        })
    }

    pub fn nuclide(&self) -> &Nuclide {
        &self.nuclide
    }

    fn mass_terms(&self, mass_gev: f64, cross_section_m2: f64) -> Result<MassTerms> {
        if !(mass_gev > 0.0 && mass_gev.is_finite()) {
            return Err(Error::domain(format!("hypothesis mass must be positive, got {mass_gev}")));
        }
        if !(cross_section_m2 >= 0.0 && cross_section_m2.is_finite()) {
            return Err(Error::domain(format!(
                "cross-section must be non-negative, got {cross_section_m2}"
            )));
        }
        let mass_kg = units::gev_to_kg(mass_gev);
        let nucleus_reduced_mass = reduced_mass(self.nuclide.mass_kg, mass_kg)?;
        let nucleon_reduced_mass = reduced_mass(units::gev_to_kg(units::NUCLEON_MASS_GEV), mass_kg)?;

        let number_density = units::number_density_per_m3(self.halo.local_density_gev_cm3, mass_gev);
        let a = self.nuclide.mass_number as f64;
        let prefactor = 2.0 * number_density * a * a * cross_section_m2
            / (4.0 * nucleon_reduced_mass * nucleon_reduced_mass);

        Ok(MassTerms {
            nucleus_reduced_mass,
            prefactor,
        })
    }

    fn rate_with(&self, h: &MassTerms, recoil_energy_j: f64) -> f64 {
        let v_min = (2.0 * self.nuclide.mass_kg * recoil_energy_j).sqrt() / (2.0 * h.nucleus_reduced_mass);
        let eta = self.halo.mean_inverse_speed(v_min);
        if eta == 0.0 {
            return 0.0;
        }
        h.prefactor * self.form_factor.squared(recoil_energy_j) * eta
    }

    /// Differential rate dR/dE in 1/(kg s J) at one recoil energy (J).
    pub fn rate_vs_energy(&self, mass_gev: f64, cross_section_m2: f64, recoil_energy_j: f64) -> Result<f64> {
        let h = self.mass_terms(mass_gev, cross_section_m2)?;
        Ok(self.rate_with(&h, recoil_energy_j))
    }

    /// Largest recoil energy (J) reachable for a hypothesis mass.
    pub fn max_recoil_energy(&self, mass_gev: f64) -> Result<f64> {
        let h = self.mass_terms(mass_gev, 0.0)?;
        let v = self.halo.max_speed();
        let mu = h.nucleus_reduced_mass;
        Ok(2.0 * mu * mu * v * v / self.nuclide.mass_kg)
    }

    /// Differential rate dR/dx in 1/(kg s m), one sample per entry of the
    /// track map: dR/dx = dR/dE · dE/dx.
    pub fn signal_spectrum(&self, map: &EnergyTrackMap, mass_gev: f64, cross_section_m2: f64) -> Result<RateSpectrum> {
        let h = self.mass_terms(mass_gev, cross_section_m2)?;
        let samples = map
            .points()
            .iter()
            .map(|p| RateSample {
                track_length: p.track_length,
                rate: self.rate_with(&h, p.recoil_energy) * p.stopping_power,
            })
            .collect();
        log::debug!("{}: signal spectrum for {mass_gev} GeV", self.nuclide.name);
        Ok(RateSpectrum { samples })
    }
}
