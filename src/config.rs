//! Run configuration.
//!
//! Every parameter of a run lives in [`RunConfig`], loaded from JSON and
//! passed explicitly into each stage. Omitted fields fall back to the
//! reference analysis (halite-like two-nuclide target, 30 nm resolution,
//! 1 kg·Myr exposure).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Halo model
// ---------------------------------------------------------------------------

/// Standard-halo velocity distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaloConfig {
    /// Galactic escape velocity.
    pub escape_velocity_km_s: f64,
    /// Velocity of the solar system relative to the halo.
    pub bulk_velocity_km_s: f64,
    /// Velocity dispersion of the halo population.
    pub velocity_dispersion_km_s: f64,
    /// Local mass density.
    pub local_density_gev_cm3: f64,
}

impl Default for HaloConfig {
    fn default() -> Self {
        Self {
            escape_velocity_km_s: 550.0,
            bulk_velocity_km_s: 230.0,
            velocity_dispersion_km_s: 166.0,
            local_density_gev_cm3: 0.4,
        }
    }
}

// ---------------------------------------------------------------------------
// Signal hypotheses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Hypothesised particle masses, one sensitivity result each.
    pub masses_gev: Vec<f64>,
    /// Per-nucleon cross-section the spectra are generated with; the
    /// sensitivity result is scaled relative to it.
    pub reference_cross_section_cm2: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            masses_gev: vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0],
            reference_cross_section_cm2: 1e-45,
        }
    }
}

// ---------------------------------------------------------------------------
// Target nuclides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclideConfig {
    pub name: String,
    /// Nucleon number A.
    pub mass_number: u32,
    /// Proton number Z.
    pub proton_number: u32,
    /// Nuclide mass in atomic mass units.
    pub mass_amu: f64,
    /// Mass fraction of this nuclide in the target.
    pub mass_fraction: f64,
    /// Stopping-power table (keV, eV/Å electronic, eV/Å nuclear).
    pub stopping_power_table: PathBuf,
}

impl NuclideConfig {
    fn sodium() -> Self {
        Self {
            name: "Na".to_string(),
            mass_number: 23,
            proton_number: 11,
            mass_amu: 22.990,
            mass_fraction: 0.5,
            stopping_power_table: PathBuf::from("data/srim_na.txt"),
        }
    }

    fn chlorine() -> Self {
        Self {
            name: "Cl".to_string(),
            mass_number: 35,
            proton_number: 17,
            mass_amu: 35.453,
            mass_fraction: 0.5,
            stopping_power_table: PathBuf::from("data/srim_cl.txt"),
        }
    }
}

// ---------------------------------------------------------------------------
// Neutrino flux
// ---------------------------------------------------------------------------

/// One continuum component: a flux column of a table, non-zero only
/// inside `[min_energy_mev, max_energy_mev]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumComponentConfig {
    pub name: String,
    /// Table with energy (MeV) in the first column and fluxes after it.
    pub table: PathBuf,
    /// Index of the flux column, counting the energy column as 0.
    pub column: usize,
    pub min_energy_mev: f64,
    pub max_energy_mev: f64,
}

/// Monoenergetic line with intensity in 1/(cm² s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineComponentConfig {
    pub energy_mev: f64,
    pub flux_per_cm2_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxConfig {
    pub continuum: Vec<ContinuumComponentConfig>,
    pub lines: Vec<LineComponentConfig>,
    /// Upper bound of every continuum integral.
    pub upper_energy_mev: f64,
    /// Recoil energies whose track length is below this are not integrated.
    pub track_length_cutoff_nm: f64,
}

impl Default for FluxConfig {
    fn default() -> Self {
        let component = |name: &str, table: &str, column: usize, min: f64, max: f64| {
            ContinuumComponentConfig {
                name: name.to_string(),
                table: PathBuf::from(table),
                column,
                min_energy_mev: min,
                max_energy_mev: max,
            }
        };
        Self {
            continuum: vec![
                component("pp", "data/nu-flux_1.txt", 1, 0.0, 0.42341),
                component("hep", "data/nu-flux_1.txt", 2, 0.0, 18.726),
                component("8B", "data/nu-flux_1.txt", 3, 0.0, 16.360),
                component("13N", "data/nu-flux_1.txt", 4, 0.0, 1.199),
                component("15O", "data/nu-flux_2.txt", 1, 0.0, 1.732),
                component("17F", "data/nu-flux_2.txt", 2, 0.0, 1.740),
                component("DSNB", "data/nu-flux_2.txt", 3, 0.0, 91.201),
                component("atmospheric", "data/nu-flux_2.txt", 4, 13.379, 981.748),
            ],
            lines: vec![
                LineComponentConfig {
                    energy_mev: 0.3843,
                    flux_per_cm2_s: 4.8e8,
                },
                LineComponentConfig {
                    energy_mev: 0.8613,
                    flux_per_cm2_s: 4.3e9,
                },
                LineComponentConfig {
                    energy_mev: 1.446,
                    flux_per_cm2_s: 1.5e8,
                },
            ],
            upper_energy_mev: 1000.0,
            track_length_cutoff_nm: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector and analysis
// ---------------------------------------------------------------------------

/// Where the resolution kernel of each bin is centred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelAnchor {
    /// Lower edge of the bin.
    BinStart,
    /// Midpoint of the bin.
    BinCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bin width, equal to the track-length resolution.
    pub bin_width_nm: f64,
    /// First bin edge; half a bin width when absent.
    pub min_track_length_nm: Option<f64>,
    /// Largest observable track length.
    pub max_track_length_nm: f64,
    /// Relative systematic uncertainty of the background count.
    pub background_systematic: f64,
    /// Minimum expected signal events for a window to be considered.
    pub signal_floor: f64,
    /// Signal-to-noise ratio required for a detection.
    pub detection_threshold: f64,
    /// Exposure in kg·Myr.
    pub exposure_kg_myr: f64,
    pub kernel_anchor: KernelAnchor,
    /// Centre of the low-track-length signal suppression, in bin widths.
    pub suppression_offset_bins: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bin_width_nm: 30.0,
            min_track_length_nm: None,
            max_track_length_nm: 1000.0,
            background_systematic: 1.0,
            signal_floor: 5.0,
            detection_threshold: 3.0,
            exposure_kg_myr: 1.0,
            kernel_anchor: KernelAnchor::BinStart,
            suppression_offset_bins: 5.0,
        }
    }
}

impl DetectorConfig {
    pub fn first_edge_nm(&self) -> f64 {
        self.min_track_length_nm.unwrap_or(self.bin_width_nm / 2.0)
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub halo: HaloConfig,
    pub signal: SignalConfig,
    pub nuclides: Vec<NuclideConfig>,
    pub flux: FluxConfig,
    pub detector: DetectorConfig,
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            halo: HaloConfig::default(),
            signal: SignalConfig::default(),
            nuclides: vec![NuclideConfig::sodium(), NuclideConfig::chlorine()],
            flux: FluxConfig::default(),
            detector: DetectorConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl RunConfig {
    /// Read and validate a JSON configuration file. Relative table paths are
    /// resolved against the directory containing the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for nuclide in &mut self.nuclides {
            resolve(&mut nuclide.stopping_power_table);
        }
        for component in &mut self.flux.continuum {
            resolve(&mut component.table);
        }
        resolve(&mut self.output_dir);
    }

    pub fn validate(&self) -> Result<()> {
        let halo = &self.halo;
        for (name, v) in [
            ("escape velocity", halo.escape_velocity_km_s),
            ("bulk velocity", halo.bulk_velocity_km_s),
            ("velocity dispersion", halo.velocity_dispersion_km_s),
            ("local density", halo.local_density_gev_cm3),
        ] {
            positive(name, v)?;
        }

        if self.signal.masses_gev.is_empty() {
            return Err(Error::domain("no hypothesis masses configured"));
        }
        for &m in &self.signal.masses_gev {
            positive("hypothesis mass", m)?;
        }
        positive("reference cross-section", self.signal.reference_cross_section_cm2)?;

        if self.nuclides.is_empty() {
            return Err(Error::domain("no target nuclides configured"));
        }
        for n in &self.nuclides {
            if n.mass_number == 0 || n.proton_number > n.mass_number {
                return Err(Error::domain(format!(
                    "nuclide {}: invalid A = {}, Z = {}",
                    n.name, n.mass_number, n.proton_number
                )));
            }
            positive(&format!("mass of {}", n.name), n.mass_amu)?;
            if !(0.0..=1.0).contains(&n.mass_fraction) {
                return Err(Error::domain(format!(
                    "nuclide {}: mass fraction {} outside [0, 1]",
                    n.name, n.mass_fraction
                )));
            }
        }

        for c in &self.flux.continuum {
            if !(c.min_energy_mev >= 0.0 && c.max_energy_mev > c.min_energy_mev) {
                return Err(Error::domain(format!(
                    "flux component {}: invalid energy interval [{}, {}] MeV",
                    c.name, c.min_energy_mev, c.max_energy_mev
                )));
            }
            if c.column == 0 {
                return Err(Error::domain(format!(
                    "flux component {}: column 0 is the energy column",
                    c.name
                )));
            }
        }
        for line in &self.flux.lines {
            positive("line energy", line.energy_mev)?;
            if line.flux_per_cm2_s < 0.0 {
                return Err(Error::domain("line flux must be non-negative"));
            }
        }
        positive("flux upper energy", self.flux.upper_energy_mev)?;
        if self.flux.track_length_cutoff_nm < 0.0 {
            return Err(Error::domain("track-length cutoff must be non-negative"));
        }

        let det = &self.detector;
        positive("bin width", det.bin_width_nm)?;
        positive("exposure", det.exposure_kg_myr)?;
        positive("detection threshold", det.detection_threshold)?;
        if det.background_systematic < 0.0 || det.signal_floor < 0.0 {
            return Err(Error::domain(
                "background systematic and signal floor must be non-negative",
            ));
        }
        if det.first_edge_nm() < 0.0 || det.max_track_length_nm <= det.first_edge_nm() {
            return Err(Error::domain(format!(
                "track-length range [{}, {}] nm is empty",
                det.first_edge_nm(),
                det.max_track_length_nm
            )));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::domain(format!("{name} must be positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        RunConfig::default().validate().unwrap();
        assert_eq!(DetectorConfig::default().first_edge_nm(), 15.0);
    }

    #[test]
    fn test_default_solar_columns_and_endpoints() {
        let flux = FluxConfig::default();
        let find = |name: &str| flux.continuum.iter().find(|c| c.name == name).unwrap();
        let hep = find("hep");
        assert_eq!((hep.column, hep.max_energy_mev), (2, 18.726));
        let boron = find("8B");
        assert_eq!((boron.column, boron.max_energy_mev), (3, 16.360));
        assert!(hep.max_energy_mev > boron.max_energy_mev);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"detector": {"bin_width_nm": 20.0, "kernel_anchor": "bin_center"}}"#)
                .unwrap();
        assert_eq!(config.detector.bin_width_nm, 20.0);
        assert_eq!(config.detector.kernel_anchor, KernelAnchor::BinCenter);
        assert_eq!(config.detector.signal_floor, 5.0);
        assert_eq!(config.signal.masses_gev.len(), 10);
        assert_eq!(config.halo, HaloConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RunConfig::default();
        config.signal.masses_gev.clear();
        assert!(matches!(config.validate(), Err(Error::Domain(_))));

        let mut config = RunConfig::default();
        config.detector.bin_width_nm = 0.0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.nuclides[0].mass_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.detector.max_track_length_nm = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, "{}").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert!(config.nuclides[0].stopping_power_table.starts_with(dir.path()));
        assert_eq!(config.output_dir, dir.path().join("output"));
    }
}
