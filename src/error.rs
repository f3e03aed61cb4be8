//! Error types shared across the crate.
//!
//! Rejected samples are not errors: the likelihood reports them as `-inf`
//! log-probabilities and the sampler simply never moves there. The types
//! here cover the other channel, problems that must stop a run before (or
//! instead of) producing a misleading chain.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems in the run configuration.
///
/// All of these are raised while the configuration is resolved or the
/// sampler is constructed, so a run that starts iterating can no longer hit
/// them.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "unsupported prior distribution `{kind}` for `{observable}` \
         (supported: gaussian, normal, uniform)"
    )]
    UnsupportedDistribution { observable: String, kind: String },

    #[error("parameter dimension must be {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("walker count must be even and at least 4, got {0}")]
    InvalidWalkerCount(usize),

    #[error("uncertainty of `{observable}` must be positive, got {sigma}")]
    InvalidSigma { observable: String, sigma: f64 },

    #[error("`{key}` bounds must satisfy lo < hi, got [{lo}, {hi}]")]
    InvalidRange { key: String, lo: f64, hi: f64 },

    #[error("sampler.check_every must be at least 1")]
    InvalidCheckInterval,

    #[error("sampler.stretch_scale must be greater than 1, got {0}")]
    InvalidStretchScale(f64),

    #[error("could not read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failures of the chain store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("could not access chain file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chain file {path:?} has an unexpected header: `{header}`")]
    BadHeader { path: PathBuf, header: String },

    #[error("malformed chain row at line {line}: {reason}")]
    BadRow { line: usize, reason: String },

    #[error("iteration {iteration} appended after iteration {last}")]
    OutOfOrder { iteration: u64, last: u64 },

    #[error("chain store has not been reset")]
    NotReset,
}
