//! Stage runner.
//!
//! Each `run_*` function computes one stage for every nuclide (and mass)
//! first and only then writes its tables, so a failing stage leaves no
//! partial output behind.
//!
//! ```text
//!  output_dir/
//!    <nuclide>_tracklengths.txt        track length (m) per stopping-power row
//!    <nuclide>_spectrum_<mass>.txt     signal dR/dx, 1/(kg s m)
//!    <nuclide>_nu-flux.txt             ∫ φ dE_ν
//!    <nuclide>_nudEnu2.txt             ∫ φ / E_ν² dE_ν
//!    <nuclide>_nu-spectrum.txt         background dR/dx, 1/(kg s m)
//!    Sensitivities<width>.txt          one row per mass
//!    sensitivities.json
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::{CompositeSpectrum, SensitivityOptimizer, SensitivityResult};
use crate::config::{FluxConfig, NuclideConfig, RunConfig};
use crate::data::model::{EnergyTrackMap, FluxTable, Hypothesis, RateSpectrum};
use crate::data::{loader, writer};
use crate::numeric::Quadrature;
use crate::physics::{
    build_track_map, ContinuumComponent, FluxIntegrator, HaloModel, IntegratedFlux, LineComponent,
    NeutrinoBackground, Nuclide, SpectrumSynthesizer,
};
use crate::units;

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn track_lengths(&self, nuclide: &str) -> PathBuf {
        self.dir.join(format!("{nuclide}_tracklengths.txt"))
    }

    pub fn spectrum(&self, nuclide: &str, hypothesis: Hypothesis) -> PathBuf {
        match hypothesis {
            Hypothesis::Signal { mass_gev } => self.dir.join(format!("{nuclide}_spectrum_{mass_gev}.txt")),
            Hypothesis::NeutrinoBackground => self.dir.join(format!("{nuclide}_nu-spectrum.txt")),
        }
    }

    pub fn integrated_flux(&self, nuclide: &str) -> PathBuf {
        self.dir.join(format!("{nuclide}_nu-flux.txt"))
    }

    pub fn integrated_flux_over_enu2(&self, nuclide: &str) -> PathBuf {
        self.dir.join(format!("{nuclide}_nudEnu2.txt"))
    }

    pub fn sensitivity_table(&self, bin_width_nm: f64) -> PathBuf {
        self.dir.join(format!("Sensitivities{bin_width_nm}.txt"))
    }

    pub fn sensitivity_summary(&self) -> PathBuf {
        self.dir.join("sensitivities.json")
    }
}

// ---------------------------------------------------------------------------
// Stage 1: track lengths
// ---------------------------------------------------------------------------

/// A target nuclide with its energy → track-length map.
#[derive(Debug, Clone)]
pub struct NuclideTrack {
    pub config: NuclideConfig,
    pub nuclide: Nuclide,
    pub map: EnergyTrackMap,
}

/// Build the track-length map of every configured nuclide.
pub fn map_track_lengths(config: &RunConfig, quadrature: &Quadrature) -> Result<Vec<NuclideTrack>> {
    config
        .nuclides
        .iter()
        .map(|n| {
            let table = loader::load_stopping_power(&n.stopping_power_table)?;
            let map = build_track_map(&table, quadrature)
                .with_context(|| format!("mapping track lengths for {}", n.name))?;
            log::info!(
                "{}: {} recoil energies, longest track {:.1} nm",
                n.name,
                map.len(),
                map.points().last().map_or(0.0, |p| units::meters_to_nm(p.track_length))
            );
            Ok(NuclideTrack {
                config: n.clone(),
                nuclide: Nuclide::from(n),
                map,
            })
        })
        .collect()
}

/// Rebuild the maps from stopping-power tables and previously written
/// track-length tables.
pub fn load_track_lengths(config: &RunConfig, layout: &OutputLayout) -> Result<Vec<NuclideTrack>> {
    config
        .nuclides
        .iter()
        .map(|n| {
            let table = loader::load_stopping_power(&n.stopping_power_table)?;
            let track_length = loader::load_column(&layout.track_lengths(&n.name))?;
            let map = EnergyTrackMap::from_tables(&table, &track_length)
                .with_context(|| format!("pairing track lengths for {}", n.name))?;
            Ok(NuclideTrack {
                config: n.clone(),
                nuclide: Nuclide::from(n),
                map,
            })
        })
        .collect()
}

pub fn run_track_lengths(config: &RunConfig, layout: &OutputLayout) -> Result<Vec<NuclideTrack>> {
    let tracks = map_track_lengths(config, &Quadrature::default())?;
    for t in &tracks {
        writer::write_column(&layout.track_lengths(&t.config.name), &t.map.track_lengths())?;
    }
    Ok(tracks)
}

// ---------------------------------------------------------------------------
// Stage 2: signal spectra
// ---------------------------------------------------------------------------

/// Per-nuclide signal spectra for one hypothesis mass, in nuclide order.
#[derive(Debug, Clone)]
pub struct SignalSpectra {
    pub mass_gev: f64,
    pub spectra: Vec<RateSpectrum>,
}

pub fn signal_spectra(config: &RunConfig, tracks: &[NuclideTrack]) -> crate::Result<Vec<SignalSpectra>> {
    let halo = HaloModel::new(&config.halo)?;
    let cross_section_m2 = units::cm2_to_m2(config.signal.reference_cross_section_cm2);
    let synthesizers = tracks
        .iter()
        .map(|t| SpectrumSynthesizer::new(t.nuclide.clone(), halo))
        .collect::<crate::Result<Vec<_>>>()?;

    config
        .signal
        .masses_gev
        .iter()
        .map(|&mass_gev| {
            let spectra = synthesizers
                .iter()
                .zip(tracks)
                .map(|(s, t)| s.signal_spectrum(&t.map, mass_gev, cross_section_m2))
                .collect::<crate::Result<Vec<_>>>()?;
            Ok(SignalSpectra { mass_gev, spectra })
        })
        .collect()
}

pub fn run_spectra(config: &RunConfig, tracks: &[NuclideTrack], layout: &OutputLayout) -> Result<Vec<SignalSpectra>> {
    let signals = signal_spectra(config, tracks).context("computing signal spectra")?;
    log::info!("signal spectra for {} masses", signals.len());
    for s in &signals {
        let hypothesis = Hypothesis::Signal { mass_gev: s.mass_gev };
        for (t, spectrum) in tracks.iter().zip(&s.spectra) {
            writer::write_column(&layout.spectrum(&t.config.name, hypothesis), &spectrum.rates())?;
        }
    }
    Ok(signals)
}

// ---------------------------------------------------------------------------
// Stage 3: neutrino flux and background
// ---------------------------------------------------------------------------

/// Load the flux tables named in `flux` (each file once) and assemble the
/// integrator.
pub fn build_flux_integrator(flux: &FluxConfig, quadrature: Quadrature) -> Result<FluxIntegrator> {
    let mut tables: BTreeMap<PathBuf, FluxTable> = BTreeMap::new();
    let mut continuum = Vec::with_capacity(flux.continuum.len());
    for c in &flux.continuum {
        if !tables.contains_key(&c.table) {
            tables.insert(c.table.clone(), loader::load_flux_table(&c.table)?);
        }
        let table = tables
            .get(&c.table)
            .with_context(|| format!("flux table {} not loaded", c.table.display()))?;
        continuum.push(
            ContinuumComponent::new(
                c.name.clone(),
                table,
                c.column,
                units::mev_to_joules(c.min_energy_mev),
                units::mev_to_joules(c.max_energy_mev),
            )
            .with_context(|| format!("building flux component {}", c.name))?,
        );
    }
    let lines = flux
        .lines
        .iter()
        .map(|l| LineComponent::from_mev(l.energy_mev, l.flux_per_cm2_s))
        .collect();
    Ok(FluxIntegrator::new(
        continuum,
        lines,
        units::mev_to_joules(flux.upper_energy_mev),
        units::nm_to_meters(flux.track_length_cutoff_nm),
        quadrature,
    )?)
}

#[derive(Debug, Clone)]
pub struct NuclideBackground {
    pub flux: IntegratedFlux,
    pub spectrum: RateSpectrum,
}

pub fn background_spectra(
    tracks: &[NuclideTrack],
    integrator: &FluxIntegrator,
) -> crate::Result<Vec<NuclideBackground>> {
    tracks
        .iter()
        .map(|t| {
            let flux = integrator.integrate(&t.map, t.nuclide.mass_kg)?;
            let spectrum = NeutrinoBackground::new(t.nuclide.clone())?.background_spectrum(&t.map, &flux)?;
            Ok(NuclideBackground { flux, spectrum })
        })
        .collect()
}

pub fn run_flux(config: &RunConfig, tracks: &[NuclideTrack], layout: &OutputLayout) -> Result<Vec<RateSpectrum>> {
    let integrator = build_flux_integrator(&config.flux, Quadrature::default())?;
    let backgrounds = background_spectra(tracks, &integrator).context("integrating neutrino fluxes")?;
    for (t, bg) in tracks.iter().zip(&backgrounds) {
        let name = &t.config.name;
        writer::write_column(&layout.integrated_flux(name), &bg.flux.phi())?;
        writer::write_column(&layout.integrated_flux_over_enu2(name), &bg.flux.phi_over_enu2())?;
        writer::write_column(&layout.spectrum(name, Hypothesis::NeutrinoBackground), &bg.spectrum.rates())?;
    }
    log::info!("neutrino background for {} nuclides", backgrounds.len());
    Ok(backgrounds.into_iter().map(|b| b.spectrum).collect())
}

// ---------------------------------------------------------------------------
// Stage 4: sensitivity
// ---------------------------------------------------------------------------

/// Result for one hypothesis mass; `NotFound` is kept per mass instead of
/// aborting the run.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisOutcome {
    pub mass_gev: f64,
    pub result: crate::Result<SensitivityResult>,
}

#[derive(Debug, Serialize)]
struct SensitivityRecord<'a> {
    mass_gev: f64,
    result: Option<&'a SensitivityResult>,
    error: Option<String>,
}

pub fn project_sensitivity(
    config: &RunConfig,
    background: &[RateSpectrum],
    signals: &[SignalSpectra],
    quadrature: Quadrature,
) -> crate::Result<Vec<HypothesisOutcome>> {
    let weights: Vec<f64> = config.nuclides.iter().map(|n| n.mass_fraction).collect();
    let exposure = config.detector.exposure_kg_myr;
    let background = CompositeSpectrum::from_spectra(weights.iter().copied().zip(background), exposure)?;
    let optimizer = SensitivityOptimizer::new(
        &config.detector,
        config.signal.reference_cross_section_cm2,
        &background,
        quadrature,
    )?;

    let mut outcomes = Vec::with_capacity(signals.len());
    for s in signals {
        let signal = CompositeSpectrum::from_spectra(weights.iter().copied().zip(&s.spectra), exposure)?;
        let result = match optimizer.optimize(&signal) {
            Ok(r) => {
                log::debug!(
                    "m = {} GeV: σ = {:.3e} cm² in [{}, {}] nm",
                    s.mass_gev,
                    r.minimum_detectable_cross_section,
                    r.window_start,
                    r.window_end
                );
                Ok(r)
            }
            Err(e) if e.is_not_found() => {
                log::warn!("m = {} GeV: {e}", s.mass_gev);
                Err(e)
            }
            Err(e) => return Err(e),
        };
        outcomes.push(HypothesisOutcome {
            mass_gev: s.mass_gev,
            result,
        });
    }
    Ok(outcomes)
}

/// Columns: mass (GeV), σ_min (cm²), window start and end (nm), signal
/// and background events. Masses without a window are written as NaN.
pub fn write_sensitivities(path: &Path, outcomes: &[HypothesisOutcome]) -> Result<()> {
    let rows: Vec<Vec<f64>> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(r) => vec![
                o.mass_gev,
                r.minimum_detectable_cross_section,
                r.window_start,
                r.window_end,
                r.signal_events,
                r.background_events,
            ],
            Err(_) => {
                let mut row = vec![f64::NAN; 6];
                row[0] = o.mass_gev;
                row
            }
        })
        .collect();
    writer::write_rows(
        path,
        Some("mass_gev cross_section_cm2 window_start_nm window_end_nm signal_events background_events"),
        &rows,
    )
}

pub fn run_sensitivity(
    config: &RunConfig,
    background: &[RateSpectrum],
    signals: &[SignalSpectra],
    layout: &OutputLayout,
) -> Result<Vec<HypothesisOutcome>> {
    let outcomes =
        project_sensitivity(config, background, signals, Quadrature::default()).context("projecting sensitivity")?;

    write_sensitivities(&layout.sensitivity_table(config.detector.bin_width_nm), &outcomes)?;
    let records: Vec<SensitivityRecord> = outcomes
        .iter()
        .map(|o| SensitivityRecord {
            mass_gev: o.mass_gev,
            result: o.result.as_ref().ok(),
            error: o.result.as_ref().err().map(ToString::to_string),
        })
        .collect();
    writer::write_json(&layout.sensitivity_summary(), &records)?;

    let found = outcomes.iter().filter(|o| o.result.is_ok()).count();
    log::info!("sensitivity found for {found} of {} masses", outcomes.len());
    Ok(outcomes)
}

/// Load previously written spectra, pairing every rate table with the
/// track-length table of its nuclide.
pub fn load_spectra(config: &RunConfig, layout: &OutputLayout) -> Result<(Vec<RateSpectrum>, Vec<SignalSpectra>)> {
    let track_lengths = config
        .nuclides
        .iter()
        .map(|n| loader::load_column(&layout.track_lengths(&n.name)))
        .collect::<Result<Vec<_>>>()?;

    let load = |hypothesis: Hypothesis| -> Result<Vec<RateSpectrum>> {
        config
            .nuclides
            .iter()
            .zip(&track_lengths)
            .map(|(n, x)| {
                let path = layout.spectrum(&n.name, hypothesis);
                let rate = loader::load_column(&path)?;
                RateSpectrum::from_columns(x, &rate)
                    .with_context(|| format!("pairing {} with {} track lengths", path.display(), n.name))
            })
            .collect()
    };

    let background = load(Hypothesis::NeutrinoBackground)?;
    let signals = config
        .signal
        .masses_gev
        .iter()
        .map(|&mass_gev| {
            Ok(SignalSpectra {
                mass_gev,
                spectra: load(Hypothesis::Signal { mass_gev })?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((background, signals))
}

/// All stages in order.
pub fn run(config: &RunConfig) -> Result<Vec<HypothesisOutcome>> {
    let layout = OutputLayout::new(&config.output_dir);
    let tracks = run_track_lengths(config, &layout)?;
    let signals = run_spectra(config, &tracks, &layout)?;
    let background = run_flux(config, &tracks, &layout)?;
    run_sensitivity(config, &background, &signals, &layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.track_lengths("Na"), PathBuf::from("out/Na_tracklengths.txt"));
        assert_eq!(
            layout.spectrum("Cl", Hypothesis::Signal { mass_gev: 100.0 }),
            PathBuf::from("out/Cl_spectrum_100.txt")
        );
        assert_eq!(
            layout.spectrum("Cl", Hypothesis::NeutrinoBackground),
            PathBuf::from("out/Cl_nu-spectrum.txt")
        );
        assert_eq!(layout.sensitivity_table(30.0), PathBuf::from("out/Sensitivities30.txt"));
    }

    #[test]
    fn test_not_found_rows_are_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.txt");
        let outcomes = vec![
            HypothesisOutcome {
                mass_gev: 10.0,
                result: Ok(SensitivityResult {
                    minimum_detectable_cross_section: 1e-44,
                    window_start: 15.0,
                    window_end: 105.0,
                    signal_events: 12.0,
                    background_events: 3.0,
                }),
            },
            HypothesisOutcome {
                mass_gev: 1.0,
                result: Err(crate::Error::not_found("nothing")),
            },
        ];
        write_sensitivities(&path, &outcomes).unwrap();
        let table = loader::load_table(&path).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column(0).unwrap(), &[10.0, 1.0]);
        assert_eq!(table.column(3).unwrap()[0], 105.0);
        assert!(table.column(1).unwrap()[1].is_nan());
    }
}
