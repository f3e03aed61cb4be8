//! Relative log-density priors on the observed quantities.
//!
//! Every prior is evaluated as a ratio against its own density at the
//! measured central value, so `ln_relative(measured, measured) == 0` and the
//! likelihood surface peaks at the observed system by construction.

use std::f64::consts::TAU;

use crate::error::ConfigError;

/// The supported prior families.
///
/// A configuration naming any other family is rejected while it is loaded,
/// long before a sampler starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorKind {
    Gaussian,
    Uniform,
}

impl PriorKind {
    /// Resolve a configured distribution name for `observable`.
    ///
    /// `"normal"` is accepted as a spelling of [`PriorKind::Gaussian`].
    pub fn resolve(observable: &str, kind: &str) -> Result<Self, ConfigError> {
        match kind {
            "gaussian" | "normal" => Ok(Self::Gaussian),
            "uniform" => Ok(Self::Uniform),
            _ => Err(ConfigError::UnsupportedDistribution {
                observable: observable.to_string(),
                kind: kind.to_string(),
            }),
        }
    }
}

/// A prior with its resolved family and configured `(location, scale)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    kind: PriorKind,
    loc: f64,
    scale: f64,
}

impl Prior {
    pub fn new(kind: PriorKind, loc: f64, scale: f64) -> Self {
        Self { kind, loc, scale }
    }

    /// Log-density at `x`.
    ///
    /// [`PriorKind::Gaussian`] reads `(loc, scale)` as mean and standard
    /// deviation. [`PriorKind::Uniform`] reads the same pair as mean and
    /// half-width and remaps it onto the conventional (lower bound, width)
    /// parameterization: the support is `[loc - scale, loc + scale]`, except
    /// that a negative lower bound is clamped to zero while the width stays
    /// `2 * scale`, shifting the window up. The quantities priors apply to
    /// here (periods, masses, speeds) cannot be negative.
    pub fn ln_pdf(&self, x: f64) -> f64 {
        match self.kind {
            PriorKind::Gaussian => {
                let z = (x - self.loc) / self.scale;
                -0.5 * z * z - self.scale.ln() - 0.5 * TAU.ln()
            }
            PriorKind::Uniform => {
                let lower = (self.loc - self.scale).max(0.0);
                let width = 2.0 * self.scale;
                if x < lower || x > lower + width {
                    f64::NEG_INFINITY
                } else {
                    -width.ln()
                }
            }
        }
    }

    /// Log-density of `x` relative to the density at `anchor`.
    ///
    /// Exactly zero for `x == anchor`. An anchor with zero density makes the
    /// ratio NaN; the likelihood engine normalizes that to `-inf`.
    pub fn ln_relative(&self, x: f64, anchor: f64) -> f64 {
        self.ln_pdf(x) - self.ln_pdf(anchor)
    }
}
