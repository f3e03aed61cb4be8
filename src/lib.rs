pub(crate) mod config;
pub(crate) mod diagnostics;
pub(crate) mod ensemble;
pub(crate) mod error;
pub(crate) mod likelihood;
pub(crate) mod model;
pub(crate) mod observables;
pub(crate) mod orbit;
pub(crate) mod params;
pub(crate) mod postprocess;
pub(crate) mod priors;
pub(crate) mod sampler;
pub(crate) mod storage;

pub use config::{
    GuessConfig, LimitsConfig, ObservableConfig, ResolvedConfig, RunConfig, SamplerConfig,
    SpreadConfig, SystemConfig,
};
pub use diagnostics::{integrated_autocorr_time, ConvergenceCheck};
pub use ensemble::{Ensemble, StretchMove, WalkerSpread};
pub use error::{ConfigError, StorageError};
pub use likelihood::{normalize_angles, KickLikelihood};
pub use model::Model;
pub use observables::{BinaryObservables, Measured, PlausibilityLimits};
pub use orbit::{separation_to_period, OrbitalTransform, PostKickOrbit, StandardKick};
pub use params::KickParams;
pub use postprocess::{clean_chain, CleanSummary};
pub use priors::{Prior, PriorKind};
pub use sampler::{Progress, ProgressCallback, RunSummary, Sampler, Settings};
pub use storage::{
    flat_samples, ChainReader, ChainRow, ChainStore, CsvChainStore, MemoryChainStore,
};
