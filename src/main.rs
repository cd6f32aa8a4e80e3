use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};

use recoil_sensitivity::analysis::SensitivityResult;
use recoil_sensitivity::config::RunConfig;
use recoil_sensitivity::pipeline::{self, HypothesisOutcome, OutputLayout};

/// Recoil track-length spectra and sensitivity projections
#[derive(Parser, Debug)]
#[command(name = "recoil-sensitivity")]
#[command(version, about)]
struct Args {
    /// Run configuration (JSON); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stopping power → track length for every nuclide
    TrackLength,

    /// Signal spectra for every hypothesis mass (reads track-length tables)
    Spectrum,

    /// Neutrino flux integrals and background spectra (reads track-length tables)
    Flux,

    /// Window search from previously written spectra
    Sensitivity,

    /// All stages in order
    Run,
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => {
            log::info!("no --config given, using the reference configuration");
            let config = RunConfig::default();
            config.validate().context("validating default configuration")?;
            config
        }
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;
    let layout = OutputLayout::new(&config.output_dir);

    match args.command {
        Command::TrackLength => {
            pipeline::run_track_lengths(&config, &layout)?;
        }
        Command::Spectrum => {
            let tracks = pipeline::load_track_lengths(&config, &layout)?;
            pipeline::run_spectra(&config, &tracks, &layout)?;
        }
        Command::Flux => {
            let tracks = pipeline::load_track_lengths(&config, &layout)?;
            pipeline::run_flux(&config, &tracks, &layout)?;
        }
        Command::Sensitivity => {
            let (background, signals) = pipeline::load_spectra(&config, &layout)?;
            report(&pipeline::run_sensitivity(&config, &background, &signals, &layout)?)?;
        }
        Command::Run => {
            report(&pipeline::run(&config)?)?;
        }
    }

    log::info!("outputs in {}", layout.dir().display());
    Ok(())
}

/// Print the sensitivity table; masses without a window show empty cells.
fn report(outcomes: &[HypothesisOutcome]) -> Result<()> {
    let column = |f: fn(&SensitivityResult) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(
            outcomes.iter().map(|o| o.result.as_ref().ok().map(f)).collect::<Vec<_>>(),
        ))
    };
    let masses: ArrayRef = Arc::new(Float64Array::from(outcomes.iter().map(|o| o.mass_gev).collect::<Vec<_>>()));
    let batch = RecordBatch::try_from_iter([
        ("mass_gev", masses),
        ("cross_section_cm2", column(|r| r.minimum_detectable_cross_section)),
        ("window_start_nm", column(|r| r.window_start)),
        ("window_end_nm", column(|r| r.window_end)),
        ("signal_events", column(|r| r.signal_events)),
        ("background_events", column(|r| r.background_events)),
    ])
    .context("building result table")?;
    println!("{}", pretty_format_batches(&[batch]).context("formatting result table")?);
    Ok(())
}
