//! The log-likelihood of a candidate pre-collapse configuration.
//!
//! One evaluation walks a fixed pipeline: normalize the kick angles, throw
//! out unphysical and implausible candidates, push the surviving orbit
//! through the kick model, and score the derived post-collapse observables
//! against the measured ones with relative priors. Rejections are `-inf`
//! return values, logged at debug level only; they are the dominant path and
//! must stay cheap.

use std::f64::consts::{PI, TAU};

use tracing::debug;

use crate::model::Model;
use crate::observables::{BinaryObservables, PlausibilityLimits};
use crate::orbit::OrbitalTransform;
use crate::params::KickParams;

/// Wrap `phi` into `[0, 2pi)` and reflect `theta` into `[0, pi]`.
///
/// A kick direction is a point on the sphere, so wrapping the azimuth and
/// reflecting the polar angle off the poles are symmetries, not rejections.
/// Values already in range come back untouched.
pub fn normalize_angles(theta: f64, phi: f64) -> (f64, f64) {
    let phi = phi.rem_euclid(TAU);
    let mut theta = theta.rem_euclid(TAU);
    if theta < 0.0 || theta > PI {
        theta = PI - theta.rem_euclid(PI);
    }
    (theta, phi)
}

/// The likelihood engine: the measured observables, the plausibility limits
/// and the orbit model, bundled for repeated evaluation.
#[derive(Debug, Clone)]
pub struct KickLikelihood<T> {
    observables: BinaryObservables,
    limits: PlausibilityLimits,
    transform: T,
}

impl<T: OrbitalTransform> KickLikelihood<T> {
    pub fn new(observables: BinaryObservables, limits: PlausibilityLimits, transform: T) -> Self {
        Self {
            observables,
            limits,
            transform,
        }
    }

    pub fn observables(&self) -> &BinaryObservables {
        &self.observables
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// Log-probability of one candidate; `-inf` marks a rejected sample.
    ///
    /// Pure: identical inputs give bit-identical results as long as the
    /// orbit model is deterministic.
    pub fn evaluate(&self, params: &KickParams) -> f64 {
        let obs = &self.observables;
        let (theta, phi) = normalize_angles(params.theta, params.phi);

        if params.m1_pre < obs.remnant_mass {
            debug!(
                m1_pre = params.m1_pre,
                remnant = obs.remnant_mass,
                "rejected: pre-collapse mass below the remnant"
            );
            return f64::NEG_INFINITY;
        }
        if params.w < 0.0 {
            debug!(w = params.w, "rejected: negative kick speed");
            return f64::NEG_INFINITY;
        }
        if params.porb_pre < 0.0 {
            debug!(porb_pre = params.porb_pre, "rejected: negative period");
            return f64::NEG_INFINITY;
        }
        if !(0.0..PI).contains(&theta) || !(0.0..TAU).contains(&phi) {
            debug!(theta, phi, "rejected: kick angles outside limits");
            return f64::NEG_INFINITY;
        }

        if params.porb_pre > self.limits.max_period {
            debug!(
                porb_pre = params.porb_pre,
                max = self.limits.max_period,
                "rejected: implausibly wide pre-collapse orbit"
            );
            return f64::NEG_INFINITY;
        }
        if params.w > self.limits.max_kick {
            debug!(
                w = params.w,
                max = self.limits.max_kick,
                "rejected: implausibly fast kick"
            );
            return f64::NEG_INFINITY;
        }
        let (m2_lo, m2_hi) = obs.companion_mass.window();
        if params.m2 < m2_lo || params.m2 > m2_hi {
            debug!(
                m2 = params.m2,
                lo = m2_lo,
                hi = m2_hi,
                "rejected: companion mass outside the measured window"
            );
            return f64::NEG_INFINITY;
        }

        let a_pre = self
            .transform
            .period_to_separation(params.porb_pre, params.m1_pre, params.m2);
        let orbit = self.transform.apply_kick(
            a_pre,
            params.m1_pre,
            params.m2,
            obs.remnant_mass,
            params.w,
            theta,
            phi,
        );
        let degenerate = !orbit.separation.is_finite()
            || !orbit.period.is_finite()
            || !orbit.eccentricity.is_finite()
            || !orbit.cos_inclination.is_finite()
            || !orbit.systemic_velocity.is_finite();
        if !orbit.survived
            || degenerate
            || orbit.eccentricity < 0.0
            || orbit.eccentricity >= 1.0
            || orbit.separation < 0.0
        {
            debug!(
                survived = orbit.survived,
                e = orbit.eccentricity,
                "rejected: no bound post-kick orbit"
            );
            return f64::NEG_INFINITY;
        }

        let inclination = orbit.cos_inclination.acos().to_degrees();

        let mut log_l = obs.period.ln_relative(orbit.period);
        log_l += obs.eccentricity.ln_relative(orbit.eccentricity);
        log_l += obs.companion_mass.ln_relative(params.m2);
        log_l += obs.systemic_velocity.ln_relative(orbit.systemic_velocity);
        log_l += obs.inclination.ln_relative(inclination);

        if !obs.period.allows(orbit.period)
            || !obs.eccentricity.allows(orbit.eccentricity)
            || !obs.companion_mass.allows(params.m2)
            || !obs.systemic_velocity.allows(orbit.systemic_velocity)
            || !obs.inclination.allows(inclination)
        {
            debug!(
                period = orbit.period,
                e = orbit.eccentricity,
                inclination,
                v_sys = orbit.systemic_velocity,
                "rejected: outside a hard window"
            );
            return f64::NEG_INFINITY;
        }

        // isotropic kick directions weigh as sin(theta); the poles carry
        // zero measure and land on -inf here
        log_l += theta.sin().ln();

        if log_l.is_nan() {
            debug!(
                period = orbit.period,
                e = orbit.eccentricity,
                inclination,
                v_sys = orbit.systemic_velocity,
                "degenerate log-likelihood normalized to -inf"
            );
            return f64::NEG_INFINITY;
        }
        log_l
    }
}

impl<T: OrbitalTransform> Model for KickLikelihood<T> {
    fn dim(&self) -> usize {
        KickParams::DIM
    }

    fn log_prob(&self, position: &[f64]) -> f64 {
        self.evaluate(&KickParams::from_position(position))
    }
}
