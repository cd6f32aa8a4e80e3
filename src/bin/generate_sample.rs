//! Write a synthetic input set: stopping-power tables for a two-nuclide
//! target, continuum neutrino flux tables and a run configuration pointing
//! at them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use recoil_sensitivity::config::RunConfig;
use recoil_sensitivity::data::writer;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a synthetic input set")]
struct Args {
    /// Directory receiving `run.json` and `data/`
    #[arg(long, default_value = "sample")]
    out: PathBuf,

    /// Seed of the flux-table jitter
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Multiplicative Gaussian noise on tabulated fluxes.
struct Jitter {
    rng: StdRng,
    noise: Normal<f64>,
}

impl Jitter {
    fn new(seed: u64, relative: f64) -> Result<Self> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            noise: Normal::new(0.0, relative).context("building flux jitter")?,
        })
    }

    fn apply(&mut self, v: f64) -> f64 {
        (v * (1.0 + self.noise.sample(&mut self.rng))).max(0.0)
    }
}

fn log_grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let (a, b) = (lo.ln(), hi.ln());
    (0..n).map(|i| (a + (b - a) * i as f64 / (n - 1) as f64).exp()).collect()
}

// ---------------------------------------------------------------------------
// Stopping power
// ---------------------------------------------------------------------------

/// Electronic ∝ √E plus a nuclear term peaking at `peak_kev`, both in eV/Å.
fn stopping_table(electronic: f64, nuclear: f64, peak_kev: f64) -> Vec<Vec<f64>> {
    log_grid(0.01, 10_000.0, 240)
        .into_iter()
        .map(|e| {
            let s_el = electronic * e.sqrt();
            let u = e / peak_kev;
            let s_nucl = 2.0 * nuclear * u.sqrt() / (1.0 + u);
            vec![e, s_el, s_nucl]
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Neutrino fluxes, 1/(cm² s MeV)
// ---------------------------------------------------------------------------

/// Allowed beta-like shape E²(Q − E)² normalised to `total` 1/(cm² s).
fn beta_spectrum(e: f64, q: f64, total: f64) -> f64 {
    if e >= q {
        return 0.0;
    }
    let norm = q.powi(5) / 30.0;
    total * e * e * (q - e).powi(2) / norm
}

/// Columns: energy, pp, hep, ⁸B, ¹³N.
fn solar_table(jitter: &mut Jitter) -> Vec<Vec<f64>> {
    (1..=2000)
        .map(|i| {
            let e = i as f64 * 0.01;
            vec![
                e,
                jitter.apply(beta_spectrum(e, 0.42341, 5.98e10)),
                jitter.apply(beta_spectrum(e, 18.726, 7.98e3)),
                jitter.apply(beta_spectrum(e, 16.36, 5.46e6)),
                jitter.apply(beta_spectrum(e, 1.199, 2.78e8)),
            ]
        })
        .collect()
}

/// Columns: energy, ¹⁵O, ¹⁷F, diffuse supernova, atmospheric.
fn extended_table(jitter: &mut Jitter) -> Vec<Vec<f64>> {
    let energies = log_grid(0.01, 1000.0, 700);
    let mut columns = vec![energies.clone(), vec![], vec![], vec![], vec![]];
    for &e in &energies {
        columns[1].push(jitter.apply(beta_spectrum(e, 1.732, 2.05e8)));
        columns[2].push(jitter.apply(beta_spectrum(e, 1.740, 5.29e6)));
        columns[3].push(jitter.apply(86.0 * e * e * (-e / 4.0).exp() / 128.0));
        columns[4].push(if e >= 13.0 { jitter.apply(10.0 * 1.7 / 13.0 * (e / 13.0).powf(-2.7)) } else { 0.0 });
    }
    columns
}

fn write_config(path: &Path, flux_2: &str) -> Result<()> {
    let mut config = RunConfig::default();
    for component in &mut config.flux.continuum {
        if component.table == Path::new("data/nu-flux_2.txt") {
            component.table = PathBuf::from(flux_2);
        }
    }
    config.validate().context("validating generated configuration")?;
    writer::write_json(path, &config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut jitter = Jitter::new(args.seed, 0.003)?;
    let data = args.out.join("data");

    let header = "Energy(keV) dE/dx_elec(eV/A) dE/dx_nucl(eV/A)";
    writer::write_rows(&data.join("srim_na.txt"), Some(header), &stopping_table(4.6, 12.0, 6.0))?;
    writer::write_rows(&data.join("srim_cl.txt"), Some(header), &stopping_table(4.1, 16.0, 11.0))?;

    writer::write_rows(
        &data.join("nu-flux_1.txt"),
        Some("E(MeV) pp hep 8B 13N, 1/(cm^2 s MeV)"),
        &solar_table(&mut jitter),
    )?;
    writer::write_parquet(
        &data.join("nu-flux_2.parquet"),
        &["energy_mev", "o15", "f17", "dsnb", "atmospheric"],
        &extended_table(&mut jitter),
    )?;

    let config_path = args.out.join("run.json");
    write_config(&config_path, "data/nu-flux_2.parquet")?;

    println!("Wrote synthetic inputs and {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_is_seeded_and_small() {
        let mut a = Jitter::new(7, 0.003).unwrap();
        let mut b = Jitter::new(7, 0.003).unwrap();
        let xs: Vec<f64> = (0..200).map(|_| a.apply(100.0)).collect();
        let ys: Vec<f64> = (0..200).map(|_| b.apply(100.0)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&v| (v - 100.0).abs() < 5.0));
        assert_eq!(a.apply(0.0), 0.0);
        assert!(Jitter::new(7, -1.0).is_err());
    }

    #[test]
    fn test_solar_columns_end_at_their_endpoints() {
        let table = solar_table(&mut Jitter::new(1, 0.003).unwrap());
        let last_nonzero = |col: usize| {
            table
                .iter()
                .filter(|row| row[col] > 0.0)
                .map(|row| row[0])
                .fold(0.0, f64::max)
        };
        // hep in column 2, ⁸B in column 3
        assert!(last_nonzero(2) > 18.0 && last_nonzero(2) < 18.726);
        assert!(last_nonzero(3) > 16.0 && last_nonzero(3) < 16.36);
    }
}
