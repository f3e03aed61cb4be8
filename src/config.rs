//! Run configuration: the YAML schema, its defaults, and fail-fast
//! resolution into engine types.
//!
//! Defaults describe Cygnus X-1 with the measurements of Miller-Jones et
//! al. (2021), so an empty document is a complete, runnable configuration.
//! `resolve` turns the raw document into validated engine inputs; every
//! unsupported or inconsistent field fails here, before any sampling
//! starts.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ensemble::WalkerSpread;
use crate::error::ConfigError;
use crate::observables::{BinaryObservables, Measured, PlausibilityLimits};
use crate::params::KickParams;
use crate::priors::PriorKind;
use crate::sampler::Settings;

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sampler: SamplerConfig,
    pub system: SystemConfig,
    pub limits: LimitsConfig,
}

/// The `sampler` section: run length, seeding, output paths and walker
/// initialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub walkers: usize,
    /// Must match the model dimension; present so a document written for a
    /// different parameterization fails loudly.
    pub dimension: usize,
    pub burn_in: u64,
    pub steps: u64,
    pub seed: u64,
    pub stretch_scale: f64,
    pub check_every: u64,
    pub check_convergence: bool,
    pub progress: bool,
    pub cores: Option<usize>,
    pub max_samples: usize,
    pub chain_path: PathBuf,
    pub processed_path: PathBuf,
    pub initial_guess: GuessConfig,
    pub spread: SpreadConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            walkers: 64,
            dimension: KickParams::DIM,
            burn_in: 500,
            steps: 10_000,
            seed: 42,
            stretch_scale: 2.0,
            check_every: 100,
            check_convergence: true,
            progress: true,
            cores: None,
            max_samples: 10_000,
            chain_path: PathBuf::from("chain.csv"),
            processed_path: PathBuf::from("processed"),
            initial_guess: GuessConfig::default(),
            spread: SpreadConfig::default(),
        }
    }
}

/// Where the walkers start.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuessConfig {
    pub porb_pre: f64,
    pub m1_pre: f64,
    pub m2: f64,
    pub w: f64,
    pub theta: f64,
    pub phi: f64,
}

impl Default for GuessConfig {
    fn default() -> Self {
        Self {
            porb_pre: 5.0,
            m1_pre: 30.0,
            m2: 40.6,
            w: 30.0,
            theta: FRAC_PI_2,
            phi: PI,
        }
    }
}

impl GuessConfig {
    fn to_position(&self) -> Vec<f64> {
        vec![
            self.porb_pre,
            self.m1_pre,
            self.m2,
            self.w,
            self.theta,
            self.phi,
        ]
    }
}

/// Uniform offset ranges added to the guess, one `[lo, hi]` pair per
/// parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    pub porb_pre: (f64, f64),
    pub m1_pre: (f64, f64),
    pub m2: (f64, f64),
    pub w: (f64, f64),
    pub theta: (f64, f64),
    pub phi: (f64, f64),
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            porb_pre: (-3.0, 6.0),
            m1_pre: (-4.0, 15.0),
            m2: (-7.0, 7.0),
            w: (-9.0, 50.0),
            theta: (-FRAC_PI_2, 3.0 * FRAC_PI_2),
            phi: (-FRAC_PI_2, FRAC_PI_2),
        }
    }
}

/// One measured observable with its uncertainty and prior family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservableConfig {
    pub value: f64,
    pub sigma: f64,
    #[serde(default = "default_prior")]
    pub prior: String,
    #[serde(default)]
    pub hard_range: Option<(f64, f64)>,
}

fn default_prior() -> String {
    "gaussian".to_string()
}

impl ObservableConfig {
    fn gaussian(value: f64, sigma: f64) -> Self {
        Self {
            value,
            sigma,
            prior: default_prior(),
            hard_range: None,
        }
    }

    fn resolve(&self, name: &str) -> Result<Measured, ConfigError> {
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(ConfigError::InvalidSigma {
                observable: name.to_string(),
                sigma: self.sigma,
            });
        }
        let kind = PriorKind::resolve(name, &self.prior)?;
        if let Some((lo, hi)) = self.hard_range {
            if !(lo < hi) {
                return Err(ConfigError::InvalidRange {
                    key: format!("system.{name}.hard_range"),
                    lo,
                    hi,
                });
            }
        }
        Ok(Measured {
            value: self.value,
            sigma: self.sigma,
            kind,
            hard_range: self.hard_range,
        })
    }
}

/// The `system` section: what we know about the observed binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub remnant_mass: f64,
    pub period: ObservableConfig,
    pub eccentricity: ObservableConfig,
    pub companion_mass: ObservableConfig,
    pub systemic_velocity: ObservableConfig,
    pub inclination: ObservableConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            remnant_mass: 21.2,
            period: ObservableConfig::gaussian(5.599836, 0.000024),
            eccentricity: ObservableConfig::gaussian(0.019, 0.003),
            companion_mass: ObservableConfig::gaussian(40.6, 7.7),
            systemic_velocity: ObservableConfig::gaussian(10.7, 2.7),
            inclination: ObservableConfig::gaussian(27.5, 0.8),
        }
    }
}

/// The `limits` section: plausibility cutoffs applied before the orbital
/// transform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_period: f64,
    pub max_kick: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = PlausibilityLimits::default();
        Self {
            max_period: limits.max_period,
            max_kick: limits.max_kick,
        }
    }
}

/// A validated configuration, expressed in engine types.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: Settings,
    pub observables: BinaryObservables,
    pub limits: PlausibilityLimits,
    pub guess: Vec<f64>,
    pub spread: WalkerSpread,
    pub chain_path: PathBuf,
    pub processed_path: PathBuf,
    pub burn_in: u64,
    pub max_samples: usize,
    pub progress: bool,
}

impl RunConfig {
    /// Load a configuration document from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the document and build the engine inputs.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.sampler.dimension != KickParams::DIM {
            return Err(ConfigError::InvalidDimension {
                expected: KickParams::DIM,
                got: self.sampler.dimension,
            });
        }
        if self.sampler.walkers < 4 || self.sampler.walkers % 2 != 0 {
            return Err(ConfigError::InvalidWalkerCount(self.sampler.walkers));
        }
        if self.sampler.check_every == 0 {
            return Err(ConfigError::InvalidCheckInterval);
        }
        if !(self.sampler.stretch_scale > 1.0) {
            return Err(ConfigError::InvalidStretchScale(self.sampler.stretch_scale));
        }

        let observables = BinaryObservables {
            remnant_mass: self.system.remnant_mass,
            period: self.system.period.resolve("period")?,
            eccentricity: self.system.eccentricity.resolve("eccentricity")?,
            companion_mass: self.system.companion_mass.resolve("companion_mass")?,
            systemic_velocity: self.system.systemic_velocity.resolve("systemic_velocity")?,
            inclination: self.system.inclination.resolve("inclination")?,
        };

        let spread_entries = [
            ("porb_pre", self.sampler.spread.porb_pre),
            ("m1_pre", self.sampler.spread.m1_pre),
            ("m2", self.sampler.spread.m2),
            ("w", self.sampler.spread.w),
            ("theta", self.sampler.spread.theta),
            ("phi", self.sampler.spread.phi),
        ];
        let mut offsets = Vec::with_capacity(spread_entries.len());
        for (name, (lo, hi)) in spread_entries {
            if !(lo < hi) {
                return Err(ConfigError::InvalidRange {
                    key: format!("sampler.spread.{name}"),
                    lo,
                    hi,
                });
            }
            offsets.push((lo, hi));
        }
        let spread = WalkerSpread::new(offsets)?;

        let settings = Settings {
            walkers: self.sampler.walkers,
            steps: self.sampler.steps,
            seed: self.sampler.seed,
            stretch_scale: self.sampler.stretch_scale,
            check_every: self.sampler.check_every,
            check_convergence: self.sampler.check_convergence,
            cores: self.sampler.cores,
        };

        Ok(ResolvedConfig {
            settings,
            observables,
            limits: PlausibilityLimits {
                max_period: self.limits.max_period,
                max_kick: self.limits.max_kick,
            },
            guess: self.sampler.initial_guess.to_position(),
            spread,
            chain_path: self.sampler.chain_path.clone(),
            processed_path: self.sampler.processed_path.clone(),
            burn_in: self.sampler.burn_in,
            max_samples: self.sampler.max_samples,
            progress: self.sampler.progress,
        })
    }
}
