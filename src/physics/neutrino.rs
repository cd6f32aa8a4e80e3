use std::f64::consts::PI;

use crate::data::model::{EnergyTrackMap, RateSample, RateSpectrum};
use crate::error::{Error, Result};
use crate::units;

use super::flux::{FluxSample, IntegratedFlux};
use super::form_factor::HelmFormFactor;
use super::spectrum::Nuclide;

/// Coherent elastic neutrino–nucleus scattering rate on one nuclide, built
/// from the integrated fluxes of the [`FluxIntegrator`](super::flux::FluxIntegrator).
///
/// dR/dE = G_F² M (ħc)² Q_W² F²(q) / (4π M) · [Φ − (M c² E / 2) · Φ/E²]
#[derive(Debug, Clone)]
pub struct NeutrinoBackground {
    nuclide: Nuclide,
    form_factor: HelmFormFactor,
    /// Everything that does not depend on the recoil energy, in m²/(kg J).
    prefactor: f64,
}

impl NeutrinoBackground {
    pub fn new(nuclide: Nuclide) -> Result<Self> {
        let form_factor = HelmFormFactor::new(nuclide.mass_number, nuclide.mass_kg)?;
        let q_w = weak_charge(&nuclide)?;
        let mass_gev = units::kg_to_gev(nuclide.mass_kg);
        let g_f = units::FERMI_CONSTANT_PER_GEV2;
        let prefactor = g_f * g_f * mass_gev * units::HBAR_C_GEV_M * units::HBAR_C_GEV_M * q_w * q_w
            / (4.0 * PI * units::JOULES_PER_GEV)
            / nuclide.mass_kg;
        if !(prefactor > 0.0 && prefactor.is_finite()) {
            return Err(Error::domain(format!(
                "{}: neutrino scattering prefactor evaluates to {prefactor:e}",
                nuclide.name
            )));
        }
        Ok(Self {
            nuclide,
            form_factor,
            prefactor,
        })
    }

    pub fn nuclide(&self) -> &Nuclide {
        &self.nuclide
    }

    /// dR/dE in 1/(kg s J) for one integrated-flux sample. Samples skipped
    /// by the integrator contribute nothing.
    pub fn rate_vs_energy(&self, sample: &FluxSample) -> f64 {
        if !sample.evaluated {
            return 0.0;
        }
        let e = sample.recoil_energy;
        let kinematic = units::rest_energy_joules(self.nuclide.mass_kg) * e / 2.0;
        let bracket = (sample.phi - kinematic * sample.phi_over_enu2).max(0.0);
        self.prefactor * self.form_factor.squared(e) * bracket
    }

    /// Background dR/dx in 1/(kg s m), one sample per track-map entry.
    ///
    /// Flux samples are matched to map entries by recoil energy, not by
    /// position.
    pub fn background_spectrum(&self, map: &EnergyTrackMap, flux: &IntegratedFlux) -> Result<RateSpectrum> {
        if map.len() != flux.samples.len() {
            return Err(Error::domain(format!(
                "{}: track map has {} entries but integrated flux has {}",
                self.nuclide.name,
                map.len(),
                flux.samples.len()
            )));
        }
        let samples = map
            .points()
            .iter()
            .zip(&flux.samples)
            .map(|(p, f)| {
                if p.recoil_energy != f.recoil_energy {
                    return Err(Error::domain(format!(
                        "{}: flux sample at {:e} J paired with track-map entry at {:e} J",
                        self.nuclide.name, f.recoil_energy, p.recoil_energy
                    )));
                }
                Ok(RateSample {
                    track_length: p.track_length,
                    rate: self.rate_vs_energy(f) * p.stopping_power,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        log::debug!("{}: neutrino background over {} samples", self.nuclide.name, samples.len());
        Ok(RateSpectrum { samples })
    }
}

/// Q_W = N − (1 − 4 sin²θ_W) Z
pub fn weak_charge(nuclide: &Nuclide) -> Result<f64> {
    Ok(nuclide.neutron_number()? as f64 - (1.0 - 4.0 * units::SIN2_THETA_WEAK) * nuclide.proton_number as f64)
}
