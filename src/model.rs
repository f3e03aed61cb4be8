//! Core abstraction for sampled probability models.

/// A target distribution the walker ensemble explores.
///
/// `-inf` from [`Model::log_prob`] marks a zero-probability point; the
/// proposal that produced it is rejected and sampling continues. Anything
/// that should stop a run instead (a misconfigured prior, a missing
/// observable) must be caught while the model is built, which keeps the hot
/// path infallible.
///
/// The trait is thread-safe to enable parallel evaluation.
pub trait Model: Send + Sync {
    /// Number of sampled dimensions.
    fn dim(&self) -> usize;

    /// Log-probability density, up to an additive constant, at `position`.
    ///
    /// Must be pure: evaluations run concurrently and may be replayed.
    fn log_prob(&self, position: &[f64]) -> f64;
}
