/// Physics stages: energy → track length, signal and background spectra.
///
/// ```text
///  StoppingPowerTable ──► track_length ──► EnergyTrackMap
///                                              │
///                  halo + form_factor ──► spectrum ──► signal RateSpectrum
///                                              │
///  FluxTable ──► flux ──► IntegratedFlux ──► neutrino ──► background RateSpectrum
/// ```

pub mod flux;
pub mod form_factor;
pub mod halo;
pub mod neutrino;
pub mod spectrum;
pub mod track_length;

pub use flux::{ContinuumComponent, FluxIntegrator, IntegratedFlux, LineComponent};
pub use halo::HaloModel;
pub use neutrino::NeutrinoBackground;
pub use spectrum::{Nuclide, SpectrumSynthesizer};
pub use track_length::build_track_map;
