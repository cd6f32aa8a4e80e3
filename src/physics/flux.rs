use serde::Serialize;

use crate::data::model::{EnergyTrackMap, FluxTable};
use crate::error::{Error, Result};
use crate::numeric::{CubicSpline, Quadrature};
use crate::units;

// ---------------------------------------------------------------------------
// Flux components
// ---------------------------------------------------------------------------

/// Continuum flux interpolated from a table, zero outside its validity
/// interval.
#[derive(Debug, Clone)]
pub struct ContinuumComponent {
    pub name: String,
    spline: CubicSpline,
    /// Validity interval in J, already clipped to the table's energy range.
    min_energy_j: f64,
    max_energy_j: f64,
}

impl ContinuumComponent {
    /// Build a component from column `column` of `table` (column 0 is the
    /// energy column) valid on `[min_energy_j, max_energy_j]`.
    pub fn new(
        name: impl Into<String>,
        table: &FluxTable,
        column: usize,
        min_energy_j: f64,
        max_energy_j: f64,
    ) -> Result<Self> {
        let name = name.into();
        let values = column
            .checked_sub(1)
            .and_then(|c| table.components.get(c))
            .ok_or_else(|| {
                Error::domain(format!(
                    "flux component {name}: column {column} not present (table has {} flux columns)",
                    table.components.len()
                ))
            })?;
        let spline = CubicSpline::new(&table.energy_j, values)?;

        let (table_lo, table_hi) = spline.domain();
        let lo = min_energy_j.max(table_lo);
        let hi = max_energy_j.min(table_hi);
        if !(hi > lo) {
            return Err(Error::domain(format!(
                "flux component {name}: validity interval [{min_energy_j:e}, {max_energy_j:e}] J \
                 does not overlap the table range [{table_lo:e}, {table_hi:e}] J"
            )));
        }
        if lo > min_energy_j || hi < max_energy_j {
            log::warn!(
                "flux component {name}: validity interval clipped to table range [{:.4} MeV, {:.4} MeV]",
                lo / units::JOULES_PER_MEV,
                hi / units::JOULES_PER_MEV
            );
        }

        Ok(Self {
            name,
            spline,
            min_energy_j: lo,
            max_energy_j: hi,
        })
    }

    /// Differential flux in 1/(m² s J); zero outside the validity interval.
    /// Interpolation overshoot below zero is clipped.
    pub fn evaluate(&self, energy_j: f64) -> f64 {
        if energy_j < self.min_energy_j || energy_j > self.max_energy_j {
            0.0
        } else {
            self.spline.evaluate(energy_j).max(0.0)
        }
    }

    pub fn interval(&self) -> (f64, f64) {
        (self.min_energy_j, self.max_energy_j)
    }

    /// ∫ φ(E) w(E) dE over `[a, b]`, split at the table energies so every
    /// piece sees a single cubic.
    fn integrate_weighted<W>(&self, a: f64, b: f64, weight: W, quadrature: &Quadrature) -> Result<f64>
    where
        W: Fn(f64) -> f64,
    {
        let mut lower = a;
        let mut total = 0.0;
        let inner = self.spline.knots().iter().copied().filter(|&k| k > a && k < b);
        for upper in inner.chain(std::iter::once(b)) {
            total += quadrature.integrate(|e| self.evaluate(e) * weight(e), lower, upper)?;
            lower = upper;
        }
        Ok(total)
    }
}

/// Monoenergetic neutrino line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineComponent {
    pub energy_j: f64,
    /// Intensity converted with the differential-flux factor, so that
    /// `intensity · E` adds to the continuum integral in 1/(m² s).
    pub intensity: f64,
}

impl LineComponent {
    pub fn from_mev(energy_mev: f64, flux_per_cm2_s: f64) -> Self {
        Self {
            energy_j: units::mev_to_joules(energy_mev),
            intensity: units::per_cm2_s_mev_to_per_m2_s_j(flux_per_cm2_s),
        }
    }
}

// ---------------------------------------------------------------------------
// IntegratedFlux – output of the integrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FluxSample {
    pub recoil_energy: f64,
    pub track_length: f64,
    /// Smallest neutrino energy able to produce this recoil, in J.
    pub min_neutrino_energy: f64,
    /// ∫ φ dE_ν above the threshold.
    pub phi: f64,
    /// ∫ φ / E_ν² dE_ν above the threshold.
    pub phi_over_enu2: f64,
    /// False below the track-length cutoff, where both integrals are left
    /// at zero without being computed.
    pub evaluated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedFlux {
    pub samples: Vec<FluxSample>,
}

impl IntegratedFlux {
    pub fn phi(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.phi).collect()
    }

    pub fn phi_over_enu2(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.phi_over_enu2).collect()
    }
}

// ---------------------------------------------------------------------------
// FluxIntegrator
// ---------------------------------------------------------------------------

/// Integrates all flux components above the recoil-dependent neutrino
/// energy threshold E_ν,min = sqrt(M c² E_R / 2).
#[derive(Debug, Clone)]
pub struct FluxIntegrator {
    continuum: Vec<ContinuumComponent>,
    lines: Vec<LineComponent>,
    upper_energy_j: f64,
    track_length_cutoff_m: f64,
    quadrature: Quadrature,
}

impl FluxIntegrator {
    pub fn new(
        continuum: Vec<ContinuumComponent>,
        lines: Vec<LineComponent>,
        upper_energy_j: f64,
        track_length_cutoff_m: f64,
        quadrature: Quadrature,
    ) -> Result<Self> {
        if !(upper_energy_j > 0.0) {
            return Err(Error::domain(format!(
                "upper integration bound must be positive, got {upper_energy_j:e} J"
            )));
        }
        Ok(Self {
            continuum,
            lines,
            upper_energy_j,
            track_length_cutoff_m,
            quadrature,
        })
    }

    pub fn min_neutrino_energy(nucleus_mass_kg: f64, recoil_energy_j: f64) -> f64 {
        (units::rest_energy_joules(nucleus_mass_kg) * recoil_energy_j / 2.0).sqrt()
    }

    /// Integrated fluxes for every entry of `map`.
    ///
    /// Thresholds are visited from the highest recoil energy down and the
    /// continuum integrals accumulated over successive threshold intervals,
    /// so both outputs are non-increasing in recoil energy by construction.
    pub fn integrate(&self, map: &EnergyTrackMap, nucleus_mass_kg: f64) -> Result<IntegratedFlux> {
        if !(nucleus_mass_kg > 0.0) {
            return Err(Error::domain(format!("nucleus mass must be positive, got {nucleus_mass_kg:e}")));
        }

        let mut samples: Vec<FluxSample> = map
            .points()
            .iter()
            .map(|p| FluxSample {
                recoil_energy: p.recoil_energy,
                track_length: p.track_length,
                min_neutrino_energy: Self::min_neutrino_energy(nucleus_mass_kg, p.recoil_energy),
                phi: 0.0,
                phi_over_enu2: 0.0,
                evaluated: p.track_length >= self.track_length_cutoff_m,
            })
            .collect();

        let skipped = samples.iter().filter(|s| !s.evaluated).count();
        if skipped > 0 {
            log::info!(
                "skipping {skipped} recoil energies below the {:.2} nm track-length cutoff",
                units::meters_to_nm(self.track_length_cutoff_m)
            );
        }

        let mut phi = 0.0;
        let mut phi_over_enu2 = 0.0;
        let mut previous = self.upper_energy_j;

        for sample in samples.iter_mut().rev().filter(|s| s.evaluated) {
            let threshold = sample.min_neutrino_energy;
            if threshold < previous {
                let (d_phi, d_phi2) = self.continuum_between(threshold, previous)?;
                phi += d_phi;
                phi_over_enu2 += d_phi2;
                previous = threshold;
            }

            let (line_phi, line_phi2) = self.lines_above(threshold);
            sample.phi = phi + line_phi;
            sample.phi_over_enu2 = phi_over_enu2 + line_phi2;
        }

        Ok(IntegratedFlux { samples })
    }

    fn continuum_between(&self, lo: f64, hi: f64) -> Result<(f64, f64)> {
        let mut phi = 0.0;
        let mut phi2 = 0.0;
        for component in &self.continuum {
            let (c_lo, c_hi) = component.interval();
            let a = lo.max(c_lo);
            let b = hi.min(c_hi);
            if b <= a {
                continue;
            }
            phi += component.integrate_weighted(a, b, |_| 1.0, &self.quadrature)?;
            phi2 += component.integrate_weighted(a, b, |e| 1.0 / (e * e), &self.quadrature)?;
        }
        Ok((phi, phi2))
    }

    fn lines_above(&self, threshold: f64) -> (f64, f64) {
        self.lines
            .iter()
            .filter(|l| threshold <= l.energy_j)
            .fold((0.0, 0.0), |(phi, phi2), l| {
                (phi + l.intensity * l.energy_j, phi2 + l.intensity / l.energy_j)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::StoppingPowerTable;
    use crate::physics::track_length::build_track_map;
    use approx::assert_relative_eq;

    const MEV: f64 = units::JOULES_PER_MEV;

    /// Flat flux of 1 per (m² s J) between 1 and 10 MeV.
    fn flat_table() -> FluxTable {
        let energy_j: Vec<f64> = (0..=20).map(|i| (0.5 + i as f64 * 0.5) * MEV).collect();
        FluxTable {
            components: vec![vec![1.0; energy_j.len()], energy_j.iter().map(|e| 1.0 / e).collect()],
            energy_j,
        }
    }

    fn map(energies_kev: &[f64]) -> EnergyTrackMap {
        let table = StoppingPowerTable {
            energy_j: energies_kev.iter().map(|&e| units::kev_to_joules(e)).collect(),
            stopping_power_j_per_m: vec![units::ev_per_angstrom_to_joules_per_meter(10.0); energies_kev.len()],
        };
        build_track_map(&table, &Quadrature::default()).unwrap()
    }

    fn integrator(lines: Vec<LineComponent>, cutoff_m: f64) -> FluxIntegrator {
        let flat = ContinuumComponent::new("flat", &flat_table(), 1, 1.0 * MEV, 10.0 * MEV).unwrap();
        FluxIntegrator::new(vec![flat], lines, 1000.0 * MEV, cutoff_m, Quadrature::default()).unwrap()
    }

    #[test]
    fn test_component_is_zero_outside_interval() {
        let c = ContinuumComponent::new("flat", &flat_table(), 1, 1.0 * MEV, 10.0 * MEV).unwrap();
        assert_eq!(c.evaluate(0.9 * MEV), 0.0);
        assert_eq!(c.evaluate(10.1 * MEV), 0.0);
        assert_relative_eq!(c.evaluate(5.0 * MEV), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_component_clipped_to_table_and_bad_column() {
        let c = ContinuumComponent::new("wide", &flat_table(), 1, 0.0, 100.0 * MEV).unwrap();
        let (lo, hi) = c.interval();
        assert_relative_eq!(lo, 0.5 * MEV);
        assert_relative_eq!(hi, 10.5 * MEV);
        assert!(ContinuumComponent::new("x", &flat_table(), 0, 0.0, MEV).is_err());
        assert!(ContinuumComponent::new("x", &flat_table(), 3, 0.0, MEV).is_err());
        assert!(ContinuumComponent::new("x", &flat_table(), 1, 20.0 * MEV, 30.0 * MEV).is_err());
    }

    #[test]
    fn test_flat_flux_integrals_match_closed_form() {
        let m = map(&[0.001, 0.01, 0.1, 1.0, 10.0, 100.0]);
        let mass = units::amu_to_kg(22.99);
        let flux = integrator(vec![], 0.0).integrate(&m, mass).unwrap();
        for s in &flux.samples {
            let a = s.min_neutrino_energy.max(MEV);
            let b = 10.0 * MEV;
            let (phi, phi2) = if b > a { (b - a, 1.0 / a - 1.0 / b) } else { (0.0, 0.0) };
            assert_relative_eq!(s.phi, phi, max_relative = 1e-8);
            assert_relative_eq!(s.phi_over_enu2, phi2, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_non_increasing_and_zero_above_all_sources() {
        let line = LineComponent::from_mev(20.0, 1e3);
        let energies: Vec<f64> = (0..60).map(|i| 0.01 * 1.25f64.powi(i)).collect();
        let m = map(&energies);
        let mass = units::amu_to_kg(22.99);
        let flux = integrator(vec![line], 0.0).integrate(&m, mass).unwrap();

        let phi = flux.phi();
        let phi2 = flux.phi_over_enu2();
        assert!(phi.windows(2).all(|w| w[1] <= w[0]));
        assert!(phi2.windows(2).all(|w| w[1] <= w[0]));
        assert!(phi[0] > 0.0);

        for s in &flux.samples {
            if s.min_neutrino_energy > 20.0 * MEV {
                assert_eq!(s.phi, 0.0);
                assert_eq!(s.phi_over_enu2, 0.0);
            }
        }
        assert!(flux.samples.iter().any(|s| s.min_neutrino_energy > 20.0 * MEV));
    }

    #[test]
    fn test_line_included_only_below_its_energy() {
        let line = LineComponent::from_mev(0.8613, 4.3e9);
        let m = map(&[0.001, 1.0e4]);
        let mass = units::amu_to_kg(22.99);
        let only_line = FluxIntegrator::new(vec![], vec![line], 1000.0 * MEV, 0.0, Quadrature::default())
            .unwrap()
            .integrate(&m, mass)
            .unwrap();
        assert_relative_eq!(only_line.samples[0].phi, line.intensity * line.energy_j);
        assert_relative_eq!(only_line.samples[0].phi_over_enu2, line.intensity / line.energy_j);
        assert_eq!(only_line.samples[1].phi, 0.0);
    }

    #[test]
    fn test_cutoff_leaves_zero_and_marks_unevaluated() {
        let m = map(&[0.001, 0.01, 0.1, 1.0]);
        let cutoff = m.points()[2].track_length;
        let flux = integrator(vec![], cutoff).integrate(&m, units::amu_to_kg(22.99)).unwrap();
        assert!(!flux.samples[0].evaluated && !flux.samples[1].evaluated);
        assert_eq!(flux.samples[0].phi, 0.0);
        assert!(flux.samples[2].evaluated && flux.samples[2].phi > 0.0);
    }
}
