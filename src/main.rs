use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kickmc::{
    clean_chain, CsvChainStore, KickLikelihood, Progress, ProgressCallback, RunConfig, Sampler,
    StandardKick,
};

/// Bayesian estimation of pre-supernova binary parameters and natal kicks.
#[derive(Parser)]
#[command(name = "kickmc", version, about)]
struct Cli {
    /// Print debug-level diagnostics.
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the ensemble sampler and write the chain.
    Run {
        /// YAML configuration file; without one the built-in Cygnus X-1
        /// defaults are used.
        #[arg(short = 'C', long = "config-file")]
        config_file: Option<PathBuf>,

        /// Override the number of worker threads.
        #[arg(long)]
        cores: Option<usize>,
    },
    /// Post-process a written chain into the processed datasets.
    Clean {
        /// YAML configuration file; without one the built-in Cygnus X-1
        /// defaults are used.
        #[arg(short = 'C', long = "config-file")]
        config_file: Option<PathBuf>,
    },
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            info!(?path, "loading configuration");
            Ok(RunConfig::from_path(path)?)
        }
        None => {
            info!("no configuration file given, using built-in defaults");
            Ok(RunConfig::default())
        }
    }
}

fn run(config_file: Option<PathBuf>, cores: Option<usize>) -> Result<()> {
    let config = load_config(config_file.as_deref())?;
    let mut resolved = config.resolve()?;
    if cores.is_some() {
        resolved.settings.cores = cores;
    }

    let engine = KickLikelihood::new(resolved.observables, resolved.limits, StandardKick);
    let sampler = Sampler::new(engine, resolved.settings, resolved.guess, resolved.spread)?;
    let mut store = CsvChainStore::new(&resolved.chain_path);

    let progress = resolved.progress.then(|| {
        Box::new(|p: &Progress| {
            info!(
                iteration = p.iteration,
                total = p.total,
                acceptance = p.acceptance,
                mean_log_prob = p.mean_log_prob,
                stuck = p.stuck_walkers,
                "progress"
            );
        }) as ProgressCallback
    });

    let summary = sampler.run(&mut store, progress, || false)?;
    info!(
        iterations = summary.iterations,
        converged = summary.converged,
        acceptance = summary.acceptance,
        "sampling finished"
    );
    if let Some(tau) = &summary.tau {
        debug!(?tau, "final autocorrelation time estimates");
    }
    info!(path = ?resolved.chain_path, "chain written");
    Ok(())
}

fn clean(config_file: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_file.as_deref())?;
    let resolved = config.resolve()?;
    let engine = KickLikelihood::new(resolved.observables, resolved.limits, StandardKick);
    let summary = clean_chain(
        &engine,
        &resolved.chain_path,
        &resolved.processed_path,
        resolved.burn_in,
        resolved.max_samples,
        resolved.settings.seed,
    )?;
    info!(
        total = summary.total,
        kept = summary.kept,
        written = summary.written,
        pre = ?summary.pre_path,
        post = ?summary.post_path,
        "processed datasets written"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let started = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "kickmc starting");

    match cli.command {
        Command::Run { config_file, cores } => run(config_file, cores)?,
        Command::Clean { config_file } => clean(config_file)?,
    }

    info!(elapsed = ?started.elapsed(), "done");
    Ok(())
}
