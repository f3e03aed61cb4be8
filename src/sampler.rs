//! The sampling driver: owns the run loop, seeding, storage and the
//! convergence checks.

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::diagnostics::{integrated_autocorr_time, ConvergenceCheck};
use crate::ensemble::{Ensemble, StretchMove, WalkerSpread};
use crate::error::ConfigError;
use crate::model::Model;
use crate::storage::ChainStore;

/// Run-level settings for the ensemble sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Ensemble size; must be even and at least 4.
    pub walkers: usize,
    /// Upper bound on iterations; convergence can stop a run earlier.
    pub steps: u64,
    /// Seed for the run's random stream.
    pub seed: u64,
    /// Stretch scale `a` of the proposal; must exceed 1.
    pub stretch_scale: f64,
    /// Iterations between convergence checks and progress reports; must be
    /// at least 1.
    pub check_every: u64,
    /// Whether to estimate autocorrelation times and stop early.
    pub check_convergence: bool,
    /// Worker threads for log-probability evaluation; `None` lets the pool
    /// pick one per core.
    pub cores: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            walkers: 64,
            steps: 10_000,
            seed: 0,
            stretch_scale: 2.0,
            check_every: 100,
            check_convergence: true,
            cores: None,
        }
    }
}

/// Snapshot of a running chain, handed to the progress callback at every
/// check interval.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Progress {
    pub iteration: u64,
    pub total: u64,
    pub acceptance: f64,
    pub mean_log_prob: f64,
    pub stuck_walkers: usize,
}

pub type ProgressCallback = Box<dyn FnMut(&Progress) + Send>;

/// What a finished run looked like.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RunSummary {
    /// Iterations actually completed.
    pub iterations: u64,
    /// Whether the stopping rule fired before the step limit.
    pub converged: bool,
    /// Mean acceptance rate over the whole run.
    pub acceptance: f64,
    /// Last per-parameter autocorrelation time estimates, if any check ran.
    pub tau: Option<Vec<f64>>,
}

/// Ensemble sampler over one model.
///
/// A sampler holds no chain state; every call to [`Sampler::run`] reseeds
/// its random stream, reinitializes the walkers and resets the store, so
/// the same sampler produces the same chain twice.
pub struct Sampler<M> {
    model: M,
    settings: Settings,
    guess: Vec<f64>,
    spread: WalkerSpread,
}

impl<M: Model> Sampler<M> {
    pub fn new(
        model: M,
        settings: Settings,
        guess: Vec<f64>,
        spread: WalkerSpread,
    ) -> Result<Self, ConfigError> {
        if settings.walkers < 4 || settings.walkers % 2 != 0 {
            return Err(ConfigError::InvalidWalkerCount(settings.walkers));
        }
        if settings.check_every == 0 {
            return Err(ConfigError::InvalidCheckInterval);
        }
        if !(settings.stretch_scale > 1.0) {
            return Err(ConfigError::InvalidStretchScale(settings.stretch_scale));
        }
        if guess.len() != model.dim() {
            return Err(ConfigError::InvalidDimension {
                expected: model.dim(),
                got: guess.len(),
            });
        }
        if spread.dim() != model.dim() {
            return Err(ConfigError::InvalidDimension {
                expected: model.dim(),
                got: spread.dim(),
            });
        }
        if settings.walkers < 2 * model.dim() {
            warn!(
                walkers = settings.walkers,
                dim = model.dim(),
                "fewer walkers than twice the dimension; mixing will be poor"
            );
        }
        Ok(Self {
            model,
            settings,
            guess,
            spread,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run the chain until the step limit, convergence, or `should_stop`.
    ///
    /// Proposal randomness comes from a single serial stream; only the
    /// log-probability evaluations fan out to the thread pool, so a seed
    /// fixes the chain bit for bit regardless of core count.
    pub fn run<S, F>(
        &self,
        store: &mut S,
        mut progress: Option<ProgressCallback>,
        mut should_stop: F,
    ) -> Result<RunSummary>
    where
        S: ChainStore + Send,
        F: FnMut() -> bool + Send,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.settings.cores.unwrap_or(0))
            .thread_name(|i| format!("kickmc-worker-{i}"))
            .build()
            .context("Could not start thread pool")?;

        let mut seed_rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
        seed_rng.set_stream(0);
        let mut rng = SmallRng::from_rng(&mut seed_rng);

        pool.install(|| {
            let mut ensemble = Ensemble::init(
                &self.model,
                &self.guess,
                &self.spread,
                self.settings.walkers,
                &mut rng,
            )?;
            let stuck = ensemble.stuck_walkers();
            if stuck > 0 {
                warn!(
                    stuck,
                    walkers = self.settings.walkers,
                    "some walkers start at zero probability"
                );
            }
            store.reset(self.settings.walkers)?;

            let proposal = StretchMove {
                scale: self.settings.stretch_scale,
            };
            let mut checker = ConvergenceCheck::default();
            let mut history: Vec<Vec<Vec<f64>>> = Vec::new();
            let mut tau: Option<Vec<f64>> = None;
            let mut converged = false;
            let mut completed = 0;

            for iteration in 1..=self.settings.steps {
                if should_stop() {
                    info!(iteration = completed, "run cancelled");
                    break;
                }
                ensemble.step(&self.model, &proposal, &mut rng);
                store.append_iteration(iteration, ensemble.positions(), ensemble.log_probs())?;
                completed = iteration;

                if self.settings.check_convergence {
                    history.push(ensemble.positions().to_vec());
                }
                if iteration % self.settings.check_every != 0 {
                    continue;
                }
                if self.settings.check_convergence {
                    let estimates = autocorr_times(&history, self.model.dim());
                    converged = checker.update(&estimates, iteration);
                    tau = Some(estimates);
                }
                debug!(
                    iteration,
                    acceptance = ensemble.acceptance_rate(),
                    mean_log_prob = ensemble.mean_log_prob(),
                    stuck = ensemble.stuck_walkers(),
                    "checkpoint"
                );
                if let Some(callback) = progress.as_mut() {
                    callback(&Progress {
                        iteration,
                        total: self.settings.steps,
                        acceptance: ensemble.acceptance_rate(),
                        mean_log_prob: ensemble.mean_log_prob(),
                        stuck_walkers: ensemble.stuck_walkers(),
                    });
                }
                if converged {
                    info!(iteration, "autocorrelation estimates stabilized, stopping");
                    break;
                }
            }

            store.flush()?;
            Ok(RunSummary {
                iterations: completed,
                converged,
                acceptance: ensemble.acceptance_rate(),
                tau,
            })
        })
    }
}

/// Per-parameter autocorrelation times from the recorded position history.
fn autocorr_times(history: &[Vec<Vec<f64>>], dim: usize) -> Vec<f64> {
    let walkers = history.first().map_or(0, |snapshot| snapshot.len());
    (0..dim)
        .map(|d| {
            let series: Vec<Vec<f64>> = (0..walkers)
                .map(|w| history.iter().map(|snapshot| snapshot[w][d]).collect())
                .collect();
            integrated_autocorr_time(&series)
        })
        .collect()
}
