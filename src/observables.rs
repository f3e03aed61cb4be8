//! The measured state of the binary under study.

use crate::priors::{Prior, PriorKind};

/// One measured quantity: central value, uncertainty, prior selection and an
/// optional hard acceptance window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measured {
    pub value: f64,
    pub sigma: f64,
    pub kind: PriorKind,
    /// Explicit cutoff applied on top of the prior; `None` means the soft
    /// prior is the only constraint.
    pub hard_range: Option<(f64, f64)>,
}

impl Measured {
    /// A Gaussian-prior measurement without a hard window.
    pub fn gaussian(value: f64, sigma: f64) -> Self {
        Self {
            value,
            sigma,
            kind: PriorKind::Gaussian,
            hard_range: None,
        }
    }

    /// The prior anchored at this measurement.
    pub fn prior(&self) -> Prior {
        Prior::new(self.kind, self.value, self.sigma)
    }

    /// Log-density of `x` relative to the measured value.
    pub fn ln_relative(&self, x: f64) -> f64 {
        self.prior().ln_relative(x, self.value)
    }

    /// The one-sigma interval `[value - sigma, value + sigma]`.
    pub fn window(&self) -> (f64, f64) {
        (self.value - self.sigma, self.value + self.sigma)
    }

    /// Whether `x` passes the hard window, if one is configured.
    pub fn allows(&self, x: f64) -> bool {
        match self.hard_range {
            Some((lo, hi)) => x >= lo && x <= hi,
            None => true,
        }
    }
}

/// Measured present-day observables plus the remnant mass the collapse must
/// at least leave behind. Built once at startup and shared read-only with
/// every concurrent likelihood evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryObservables {
    /// Black-hole (remnant) mass, solar masses.
    pub remnant_mass: f64,
    /// Present-day orbital period, days.
    pub period: Measured,
    /// Present-day eccentricity.
    pub eccentricity: Measured,
    /// Companion mass, solar masses.
    pub companion_mass: Measured,
    /// Systemic (peculiar) velocity, km/s.
    pub systemic_velocity: Measured,
    /// Orbital inclination, degrees.
    pub inclination: Measured,
}

/// Upper bounds that cut off implausible proposals before the orbit model
/// runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibilityLimits {
    /// Largest pre-collapse orbital period considered, days.
    pub max_period: f64,
    /// Largest kick speed considered, km/s.
    pub max_kick: f64,
}

impl Default for PlausibilityLimits {
    fn default() -> Self {
        Self {
            max_period: 1.0e3,
            max_kick: 600.0,
        }
    }
}
