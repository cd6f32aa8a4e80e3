
use serde::Serialize;

use crate::error::{Error, Result};
use crate::units;

// ---------------------------------------------------------------------------
// NumericTable – a flat table as read from disk
// ---------------------------------------------------------------------------

/// Column-major numeric table. Every column has the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    /// Column names; generated (`col0`, `col1`, ...) for headerless files.
    pub column_names: Vec<String>,
    /// One `Vec` per column.
    pub columns: Vec<Vec<f64>>,
}

impl NumericTable {
    /// Build from row-major data; rows must all have the same width.
    pub fn from_rows(column_names: Option<Vec<String>>, rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::domain(format!(
                "row {i} has {} values, expected {width}",
                row.len()
            )));
        }
        let column_names = match column_names {
            Some(names) if names.len() == width => names,
            Some(names) => {
                return Err(Error::domain(format!(
                    "{} column names for {width} columns",
                    names.len()
                )))
            }
            None => (0..width).map(|i| format!("col{i}")).collect(),
        };
        let columns = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).collect())
            .collect();
        Ok(Self {
            column_names,
            columns,
        })
    }

    pub fn from_columns(column_names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if column_names.len() != columns.len() {
            return Err(Error::domain(format!(
                "{} column names for {} columns",
                column_names.len(),
                columns.len()
            )));
        }
        let len = columns.first().map(Vec::len).unwrap_or(0);
        if let Some((name, col)) = column_names
            .iter()
            .zip(&columns)
            .find(|(_, c)| c.len() != len)
        {
            return Err(Error::domain(format!(
                "column '{name}' has {} values, expected {len}",
                col.len()
            )));
        }
        Ok(Self {
            column_names,
            columns,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Result<&[f64]> {
        self.columns.get(idx).map(Vec::as_slice).ok_or_else(|| {
            Error::domain(format!(
                "column {idx} requested from a table with {} columns",
                self.columns.len()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// StoppingPowerTable – recoil energy vs total stopping power
// ---------------------------------------------------------------------------

/// Stopping power of the target for one recoiling nuclide, in SI units.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingPowerTable {
    /// Recoil energy in J, strictly increasing.
    pub energy_j: Vec<f64>,
    /// Total (electronic + nuclear) stopping power in J/m.
    pub stopping_power_j_per_m: Vec<f64>,
}

impl StoppingPowerTable {
    /// Interpret a three-column table: recoil energy (keV), electronic and
    /// nuclear stopping power (eV/Å).
    pub fn from_table(table: &NumericTable) -> Result<Self> {
        if table.n_columns() < 3 {
            return Err(Error::domain(format!(
                "stopping-power table needs 3 columns, found {}",
                table.n_columns()
            )));
        }
        let energy_j = table.column(0)?.iter().map(|&e| units::kev_to_joules(e)).collect();
        let stopping_power_j_per_m = table
            .column(1)?
            .iter()
            .zip(table.column(2)?)
            .map(|(&el, &nucl)| units::ev_per_angstrom_to_joules_per_meter(el + nucl))
            .collect();
        Ok(Self {
            energy_j,
            stopping_power_j_per_m,
        })
    }

    pub fn len(&self) -> usize {
        self.energy_j.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy_j.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FluxTable – tabulated continuum neutrino fluxes for one energy range
// ---------------------------------------------------------------------------

/// Neutrino energy grid plus one differential flux per component.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxTable {
    /// Neutrino energy in J.
    pub energy_j: Vec<f64>,
    /// Differential fluxes in 1/(m² s J), one column per component.
    pub components: Vec<Vec<f64>>,
}

impl FluxTable {
    /// Interpret a table of energy (MeV) followed by flux columns in
    /// 1/(cm² s MeV).
    pub fn from_table(table: &NumericTable) -> Result<Self> {
        if table.n_columns() < 2 {
            return Err(Error::domain(format!(
                "flux table needs an energy column and at least one flux column, found {} columns",
                table.n_columns()
            )));
        }
        let energy_j = table.column(0)?.iter().map(|&e| units::mev_to_joules(e)).collect();
        let components = table.columns[1..]
            .iter()
            .map(|col| col.iter().map(|&f| units::per_cm2_s_mev_to_per_m2_s_j(f)).collect())
            .collect();
        Ok(Self {
            energy_j,
            components,
        })
    }
}

// ---------------------------------------------------------------------------
// EnergyTrackMap – recoil energy → track length
// ---------------------------------------------------------------------------

/// One tabulated recoil energy and what the mapper derived for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPoint {
    /// Recoil energy in J.
    pub recoil_energy: f64,
    /// Track length in m.
    pub track_length: f64,
    /// Total stopping power dE/dx at this energy in J/m.
    pub stopping_power: f64,
}

/// Monotonic recoil-energy → track-length curve for one nuclide.
///
/// Only the mapper constructs it, so both coordinates are strictly
/// increasing and the first track length is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyTrackMap {
    points: Vec<TrackPoint>,
}

impl EnergyTrackMap {
    pub(crate) fn from_points(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    /// Rebuild from a previously written track-length table paired with the
    /// stopping-power table it was computed from.
    pub fn from_tables(stopping: &StoppingPowerTable, track_length_m: &[f64]) -> Result<Self> {
        if stopping.len() != track_length_m.len() {
            return Err(Error::domain(format!(
                "stopping-power table has {} rows but track-length table has {}",
                stopping.len(),
                track_length_m.len()
            )));
        }
        let points: Vec<TrackPoint> = stopping
            .energy_j
            .iter()
            .zip(&stopping.stopping_power_j_per_m)
            .zip(track_length_m)
            .map(|((&e, &s), &x)| TrackPoint {
                recoil_energy: e,
                track_length: x,
                stopping_power: s,
            })
            .collect();
        if points
            .windows(2)
            .any(|w| !(w[1].recoil_energy > w[0].recoil_energy && w[1].track_length > w[0].track_length))
        {
            return Err(Error::domain(
                "energy/track-length pairs must be strictly increasing in both coordinates",
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn track_lengths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.track_length).collect()
    }
}

// ---------------------------------------------------------------------------
// RateSpectrum – differential rate vs track length
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSample {
    /// Track length in m.
    pub track_length: f64,
    /// Events per kg per s per m of track length.
    pub rate: f64,
}

/// Differential rate for one nuclide and one hypothesis (a signal mass or
/// the neutrino background).
#[derive(Debug, Clone, PartialEq)]
pub struct RateSpectrum {
    pub samples: Vec<RateSample>,
}

impl RateSpectrum {
    /// Pair a track-length column with a rate column of the same length.
    pub fn from_columns(track_length_m: &[f64], rate: &[f64]) -> Result<Self> {
        if track_length_m.len() != rate.len() {
            return Err(Error::domain(format!(
                "track-length table has {} rows but rate table has {}",
                track_length_m.len(),
                rate.len()
            )));
        }
        Ok(Self {
            samples: track_length_m
                .iter()
                .zip(rate)
                .map(|(&x, &r)| RateSample {
                    track_length: x,
                    rate: r,
                })
                .collect(),
        })
    }

    pub fn track_lengths(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.track_length).collect()
    }

    pub fn rates(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.rate).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Hypothesis – what a spectrum describes
// ---------------------------------------------------------------------------

/// Label used to key spectra and results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Hypothesis {
    /// Signal particle of the given mass in GeV.
    Signal { mass_gev: f64 },
    /// Coherent neutrino–nucleus scattering background.
    NeutrinoBackground,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_from_rows() {
        let table = NumericTable::from_rows(None, &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names, vec!["col0", "col1"]);
        assert_eq!(table.column(1).unwrap(), &[2.0, 4.0]);
        assert!(table.column(2).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let res = NumericTable::from_rows(None, &[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(res, Err(Error::Domain(_))));
    }

    #[test]
    fn test_stopping_power_units() {
        let table = NumericTable::from_rows(None, &[vec![1.0, 2.0, 0.5], vec![2.0, 3.0, 0.25]]).unwrap();
        let sp = StoppingPowerTable::from_table(&table).unwrap();
        assert_relative_eq!(sp.energy_j[0], 1.602_176_634e-16, max_relative = 1e-12);
        assert_relative_eq!(sp.stopping_power_j_per_m[0], 2.5 * 1.602_176_634e-9, max_relative = 1e-12);
    }

    #[test]
    fn test_flux_table_units() {
        let table = NumericTable::from_rows(None, &[vec![1.0, 1.0, 2.0], vec![2.0, 3.0, 4.0]]).unwrap();
        let flux = FluxTable::from_table(&table).unwrap();
        assert_eq!(flux.components.len(), 2);
        // 1/(cm² s MeV) → 1/(m² s J)
        assert_relative_eq!(flux.components[0][0], 1e4 / 1.602_176_634e-13, max_relative = 1e-12);
    }

    #[test]
    fn test_rate_spectrum_length_mismatch() {
        assert!(RateSpectrum::from_columns(&[0.0, 1.0], &[1.0]).is_err());
        let rs = RateSpectrum::from_columns(&[0.0, 1.0], &[2.0, 1.0]).unwrap();
        assert_eq!(rs.rates(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_energy_track_map_from_tables() {
        let stopping = StoppingPowerTable {
            energy_j: vec![1.0, 2.0, 3.0],
            stopping_power_j_per_m: vec![1.0, 1.0, 1.0],
        };
        let map = EnergyTrackMap::from_tables(&stopping, &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(map.len(), 3);
        assert!(EnergyTrackMap::from_tables(&stopping, &[0.0, 1.0]).is_err());
        assert!(EnergyTrackMap::from_tables(&stopping, &[0.0, 1.0, 1.0]).is_err());
    }
}
