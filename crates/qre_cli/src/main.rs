//! Command-line driver: reads a normal-form game on standard input,
//! traces a branch of its logit equilibrium correspondence, and writes
//! one record per accepted step (or a single terminal record with `-e`).

mod nfg;
mod output;

use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use qre_core::game::PayoffOracle;
use qre_core::mle::Observations;
use qre_core::tracer::{trace_path, TraceSettings};

use crate::output::ProfileWriter;

/// Trace a branch of the logit quantal response equilibrium correspondence
/// of a normal-form game read from standard input.
#[derive(Parser, Debug)]
#[command(name = "qretrace")]
struct Cli {
    /// Decimals of precision in the output
    #[arg(short = 'd', value_name = "DECIMALS", default_value_t = 6)]
    decimals: usize,

    /// Initial step size
    #[arg(short = 's', value_name = "STEP", default_value_t = 0.03)]
    step: f64,

    /// Maximum deceleration
    #[arg(short = 'a', value_name = "ACCEL", default_value_t = 1.1)]
    max_decel: f64,

    /// Stop when lambda reaches this bound
    #[arg(short = 'm', value_name = "MAXLAMBDA", default_value_t = 1.0e6)]
    max_lambda: f64,

    /// Print only the terminal equilibrium (default is the entire branch)
    #[arg(short = 'e')]
    terminal_only: bool,

    /// Quiet mode: suppress the banner
    #[arg(short = 'q')]
    quiet: bool,

    /// Maximum-likelihood mode: fit the observed play frequencies in FILE
    #[arg(short = 'L', value_name = "FILE")]
    observations: Option<PathBuf>,
}

fn print_banner() {
    eprintln!("Trace a branch of the logit equilibrium correspondence");
    eprintln!("qretrace version {}", env!("CARGO_PKG_VERSION"));
    eprintln!();
}

/// Reads one comma-separated record of `len` observation weights; the
/// trailing portion of the line is discarded.
fn read_observations(path: &Path, len: usize) -> Result<Observations> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read observation file {}", path.display()))?;
    let line = contents.lines().next().unwrap_or("");

    let mut weights = Vec::with_capacity(len);
    for field in line.split(',') {
        if weights.len() == len {
            break;
        }
        let value: f64 = field
            .trim()
            .parse()
            .with_context(|| format!("Malformed observation value `{}`", field.trim()))?;
        weights.push(value);
    }
    if weights.len() < len {
        bail!(
            "Observation file holds {} values, expected {}.",
            weights.len(),
            len
        );
    }
    Ok(Observations::new(weights))
}

fn run(cli: &Cli) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read the game from standard input")?;
    let game = nfg::parse_game(&input)?;
    log::debug!(
        "read game `{}` with profile length {}",
        game.title(),
        game.layout().profile_len()
    );

    let observations = match &cli.observations {
        Some(path) => {
            let obs = read_observations(path, game.layout().profile_len())?;
            log::debug!("maximum-likelihood mode with {} observation weights", obs.len());
            Some(obs)
        }
        None => None,
    };

    let settings = TraceSettings {
        max_decel: cli.max_decel,
        first_step: cli.step,
        max_lambda: cli.max_lambda,
        full_graph: !cli.terminal_only,
    };

    let stdout = std::io::stdout();
    let mut sink = ProfileWriter::new(stdout.lock(), cli.decimals);
    trace_path(&game, settings, observations.as_ref(), &mut sink)?;
    log::debug!("trace finished");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    if !cli.quiet {
        print_banner();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("qretrace: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
