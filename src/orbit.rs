//! Two-body orbital mechanics of an instantaneous natal kick.
//!
//! The likelihood only needs two operations, period-to-separation conversion
//! and the post-kick orbit, so they form the [`OrbitalTransform`] trait and
//! [`StandardKick`] carries the closed-form two-body solution (Kalogera
//! 1996). The pre-kick orbit is assumed circular. Coordinates put the
//! pre-collapse relative orbital velocity along +y and the separation vector
//! along +x, so a kick of speed `w` decomposes as
//! `w_x = w sin(theta) cos(phi)`, `w_y = w cos(theta)`,
//! `w_z = w sin(theta) sin(phi)`.

use std::f64::consts::TAU;

/// cm^3 g^-1 s^-2
const STANDARD_CGRAV: f64 = 6.67430e-8;
/// g
const MSUN: f64 = 1.9892e33;
/// cm
const RSUN: f64 = 6.9598e10;
/// s
const DAY: f64 = 86400.0;
/// cm
const KM: f64 = 1.0e5;

/// Orbit state right after the kick.
///
/// Separation in solar radii, period in days, systemic velocity in km/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostKickOrbit {
    pub separation: f64,
    pub period: f64,
    pub eccentricity: f64,
    pub cos_inclination: f64,
    pub systemic_velocity: f64,
    pub survived: bool,
}

impl PostKickOrbit {
    /// Marker for a disrupted binary; the orbital fields carry no meaning.
    pub fn disrupted() -> Self {
        Self {
            separation: f64::NAN,
            period: f64::NAN,
            eccentricity: f64::NAN,
            cos_inclination: f64::NAN,
            systemic_velocity: f64::NAN,
            survived: false,
        }
    }
}

/// The orbital-mechanics operations the likelihood depends on.
///
/// Implementations must be pure functions of their arguments: no hidden
/// state, no I/O, identical outputs for identical inputs.
pub trait OrbitalTransform: Send + Sync {
    /// Pre-collapse orbital separation [Rsun] from the orbital period
    /// [days] and the component masses [Msun], via Kepler's third law.
    fn period_to_separation(&self, period: f64, m1: f64, m2: f64) -> f64;

    /// Orbit after `m1` collapses to `remnant_mass` and the remnant receives
    /// a kick of `kick_speed` [km/s] in the direction `(theta, phi)`.
    #[allow(clippy::too_many_arguments)]
    fn apply_kick(
        &self,
        separation: f64,
        m1: f64,
        m2: f64,
        remnant_mass: f64,
        kick_speed: f64,
        theta: f64,
        phi: f64,
    ) -> PostKickOrbit;
}

/// Orbital period [days] from the separation [Rsun] and component masses
/// [Msun]; the inverse of [`OrbitalTransform::period_to_separation`].
pub fn separation_to_period(separation: f64, m1: f64, m2: f64) -> f64 {
    let a = separation * RSUN;
    let m = (m1 + m2) * MSUN;
    TAU * (a.powi(3) / (STANDARD_CGRAV * m)).sqrt() / DAY
}

/// The closed-form instantaneous-kick solution.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardKick;

impl OrbitalTransform for StandardKick {
    fn period_to_separation(&self, period: f64, m1: f64, m2: f64) -> f64 {
        let p = period * DAY;
        let m = (m1 + m2) * MSUN;
        (STANDARD_CGRAV * m * (p / TAU).powi(2)).cbrt() / RSUN
    }

    fn apply_kick(
        &self,
        separation: f64,
        m1: f64,
        m2: f64,
        remnant_mass: f64,
        kick_speed: f64,
        theta: f64,
        phi: f64,
    ) -> PostKickOrbit {
        let a = separation * RSUN;
        let mi = (m1 + m2) * MSUN;
        let mf = (remnant_mass + m2) * MSUN;
        let w = kick_speed * KM;

        // relative orbital velocity of the circular pre-kick orbit
        let v = (STANDARD_CGRAV * mi / a).sqrt();
        let (sin_t, cos_t) = theta.sin_cos();
        let (sin_p, cos_p) = phi.sin_cos();
        let wx = w * sin_t * cos_p;
        let wy = w * cos_t;
        let wz = w * sin_t * sin_p;

        // orbital energy after the kick fixes the new separation
        let denom = 2.0 / a - (w * w + v * v + 2.0 * wy * v) / (STANDARD_CGRAV * mf);
        if !denom.is_finite() || denom <= 0.0 {
            return PostKickOrbit::disrupted();
        }
        let a_post = 1.0 / denom;

        // specific angular momentum fixes the eccentricity
        let hy = v + wy;
        let h2 = a * a * (hy * hy + wz * wz);
        let mut e2 = 1.0 - h2 / (STANDARD_CGRAV * mf * a_post);
        if !(e2 < 1.0) {
            // h2 == 0: head-on radial orbit, the stars merge
            return PostKickOrbit::disrupted();
        }
        if e2 < 0.0 {
            // circular orbits land here through rounding
            if e2 > -1.0e-12 {
                e2 = 0.0;
            } else {
                return PostKickOrbit::disrupted();
            }
        }
        let eccentricity = e2.sqrt();

        // tilt between the pre- and post-kick orbital angular momenta
        let cos_inclination = hy / (hy * hy + wz * wz).sqrt();

        // linear momentum carried off by mass loss plus the kick
        let m1_pre = m1 * MSUN;
        let m1_post = remnant_mass * MSUN;
        let m2_g = m2 * MSUN;
        let px = m1_post * wx;
        let py = m1_post * wy + v * m2_g * (m1_post - m1_pre) / mi;
        let pz = m1_post * wz;
        let systemic_velocity = (px * px + py * py + pz * pz).sqrt() / mf / KM;

        let period = TAU * (a_post.powi(3) / (STANDARD_CGRAV * mf)).sqrt() / DAY;

        PostKickOrbit {
            separation: a_post / RSUN,
            period,
            eccentricity,
            cos_inclination,
            systemic_velocity,
            survived: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn kepler_round_trip() {
        let kick = StandardKick;
        let a = kick.period_to_separation(5.599836, 21.2, 40.6);
        assert!(a > 0.0);
        assert_relative_eq!(
            separation_to_period(a, 21.2, 40.6),
            5.599836,
            max_relative = 1e-10
        );
    }

    #[test]
    fn wider_orbits_have_longer_periods() {
        let kick = StandardKick;
        let a1 = kick.period_to_separation(3.0, 25.0, 40.0);
        let a2 = kick.period_to_separation(30.0, 25.0, 40.0);
        assert!(a2 > a1);
    }

    #[test]
    fn zero_kick_no_mass_loss_keeps_the_orbit() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 25.0, 40.0);
        let orbit = kick.apply_kick(a, 25.0, 40.0, 25.0, 0.0, 1.0, 2.0);
        assert!(orbit.survived);
        assert_relative_eq!(orbit.separation, a, max_relative = 1e-10);
        assert_relative_eq!(orbit.period, 3.0, max_relative = 1e-10);
        assert_abs_diff_eq!(orbit.eccentricity, 0.0, epsilon = 1e-6);
        assert_eq!(orbit.cos_inclination, 1.0);
        assert_eq!(orbit.systemic_velocity, 0.0);
    }

    #[test]
    fn zero_kick_mass_loss_is_the_blaauw_case() {
        let kick = StandardKick;
        let (m1, m2, remnant) = (25.0, 40.0, 20.0);
        let a = kick.period_to_separation(3.0, m1, m2);
        let orbit = kick.apply_kick(a, m1, m2, remnant, 0.0, 1.0, 2.0);
        assert!(orbit.survived);

        // symmetric mass loss of dm leaves e = dm / (m_remnant + m2)
        let (mi, mf, dm) = (m1 + m2, remnant + m2, m1 - remnant);
        assert_relative_eq!(orbit.eccentricity, dm / mf, max_relative = 1e-8);
        assert_relative_eq!(
            orbit.separation,
            a * mf / (2.0 * mf - mi),
            max_relative = 1e-10
        );
        assert_eq!(orbit.cos_inclination, 1.0);

        // recoil speed v * m2 * dm / (mi * mf), with v from 2 pi a / P
        let v_kms = TAU * (a * RSUN) / (3.0 * DAY) / KM;
        assert_relative_eq!(
            orbit.systemic_velocity,
            v_kms * m2 * dm / (mi * mf),
            max_relative = 1e-8
        );
    }

    #[test]
    fn losing_more_than_half_the_mass_unbinds() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 30.0, 10.0);
        let orbit = kick.apply_kick(a, 30.0, 10.0, 5.0, 0.0, 1.0, 2.0);
        assert!(!orbit.survived);
        assert!(orbit.eccentricity.is_nan());
    }

    #[test]
    fn extreme_kick_unbinds() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 25.0, 40.0);
        let orbit = kick.apply_kick(a, 25.0, 40.0, 20.0, 5000.0, 1.5, 0.5);
        assert!(!orbit.survived);
    }

    #[test]
    fn moderate_kick_bends_the_orbit() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 25.0, 40.0);
        let half_pi = std::f64::consts::FRAC_PI_2;
        // fully out-of-plane kick
        let orbit = kick.apply_kick(a, 25.0, 40.0, 20.0, 100.0, half_pi, half_pi);
        assert!(orbit.survived);
        assert!(orbit.eccentricity > 0.0 && orbit.eccentricity < 1.0);
        assert!(orbit.cos_inclination > 0.0 && orbit.cos_inclination < 1.0);
        assert!(orbit.systemic_velocity > 0.0);
        assert!(orbit.period > 0.0);
    }

    #[test]
    fn in_plane_kick_keeps_the_plane() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 25.0, 40.0);
        let orbit = kick.apply_kick(a, 25.0, 40.0, 20.0, 150.0, 1.0, 0.0);
        assert!(orbit.survived);
        assert_eq!(orbit.cos_inclination, 1.0);
    }

    #[test]
    fn mirror_symmetry_in_phi() {
        let kick = StandardKick;
        let a = kick.period_to_separation(3.0, 25.0, 40.0);
        let up = kick.apply_kick(a, 25.0, 40.0, 20.0, 150.0, 1.0, 0.7);
        let down = kick.apply_kick(a, 25.0, 40.0, 20.0, 150.0, 1.0, -0.7);
        assert!(up.survived && down.survived);
        assert_relative_eq!(up.separation, down.separation, max_relative = 1e-12);
        assert_relative_eq!(up.eccentricity, down.eccentricity, max_relative = 1e-12);
        assert_relative_eq!(
            up.cos_inclination,
            down.cos_inclination,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            up.systemic_velocity,
            down.systemic_velocity,
            max_relative = 1e-12
        );
    }
}
