//! Recoil track-length spectra and sensitivity projections for directional
//! detectors.
//!
//! The stages run in order: stopping power → track length
//! ([`physics::track_length`]), halo signal spectra ([`physics::spectrum`]),
//! neutrino flux integrals and background ([`physics::flux`],
//! [`physics::neutrino`]), then the window search of
//! [`analysis::optimizer`]. [`pipeline`] wires them together for a
//! [`config::RunConfig`].

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod numeric;
pub mod physics;
pub mod pipeline;
pub mod units;

pub use error::{Error, Result};
