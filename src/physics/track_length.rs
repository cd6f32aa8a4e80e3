use crate::data::model::{EnergyTrackMap, StoppingPowerTable, TrackPoint};
use crate::error::{Error, Result};
use crate::numeric::{CubicSpline, Quadrature};

/// Integrate the inverse stopping power to obtain the track length for
/// every tabulated recoil energy.
///
/// x(E) = ∫_{E₀}^{E} dE' / S(E'), with S a cubic spline through the table and
/// E₀ the lowest tabulated energy. The integral is accumulated segment by
/// segment, so each table interval is integrated exactly once.
pub fn build_track_map(table: &StoppingPowerTable, quadrature: &Quadrature) -> Result<EnergyTrackMap> {
    if table.len() < 2 {
        return Err(Error::domain(format!(
            "stopping-power table needs at least 2 samples, found {}",
            table.len()
        )));
    }
    if let Some((i, s)) = table
        .stopping_power_j_per_m
        .iter()
        .enumerate()
        .find(|(_, s)| !(**s > 0.0 && s.is_finite()))
    {
        return Err(Error::domain(format!(
            "stopping power must be positive, found {s} at row {i}"
        )));
    }

    let energies = &table.energy_j;
    let stopping = CubicSpline::new(energies, &table.stopping_power_j_per_m)?;

    let mut points = Vec::with_capacity(table.len());
    let mut track_length = 0.0;
    points.push(TrackPoint {
        recoil_energy: energies[0],
        track_length,
        stopping_power: table.stopping_power_j_per_m[0],
    });

    for i in 1..energies.len() {
        let (lo, hi) = (energies[i - 1], energies[i]);
        let mut non_positive = None;
        let segment = quadrature.integrate(
            |e| {
                let s = stopping.evaluate(e);
                if s <= 0.0 {
                    non_positive.get_or_insert(e);
                }
                1.0 / s
            },
            lo,
            hi,
        )?;
        if let Some(e) = non_positive {
            return Err(Error::domain(format!(
                "interpolated stopping power is non-positive at {e:e} J (between rows {} and {i})",
                i - 1
            )));
        }
        if !(segment > 0.0) {
            return Err(Error::numerical(format!(
                "track-length increment {segment:e} between rows {} and {i} is not positive",
                i - 1
            )));
        }
        track_length += segment;
        points.push(TrackPoint {
            recoil_energy: hi,
            track_length,
            stopping_power: table.stopping_power_j_per_m[i],
        });
    }

    log::debug!(
        "track lengths up to {:.3e} m over {} recoil energies",
        track_length,
        points.len()
    );
    Ok(EnergyTrackMap::from_points(points))
}
