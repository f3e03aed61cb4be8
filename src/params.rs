//! The sampled parameter space.

/// One point in the 6-dimensional pre-collapse parameter space.
///
/// Units: orbital period in days, masses in solar masses, kick speed in
/// km/s, kick angles in radians. The polar angle `theta` is measured from
/// the pre-collapse orbital velocity, the azimuth `phi` in the plane
/// perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickParams {
    /// Pre-collapse orbital period.
    pub porb_pre: f64,
    /// Pre-collapse mass of the collapsing star.
    pub m1_pre: f64,
    /// Companion mass.
    pub m2: f64,
    /// Natal kick speed.
    pub w: f64,
    /// Kick polar angle.
    pub theta: f64,
    /// Kick azimuthal angle.
    pub phi: f64,
}

impl KickParams {
    pub const DIM: usize = 6;

    /// Column names in chain-file order.
    pub const NAMES: [&'static str; Self::DIM] =
        ["porb_pre", "m1_pre", "m2", "w", "theta", "phi"];

    /// Read a parameter vector from a position slice in [`Self::NAMES`] order.
    ///
    /// Panics if the slice does not have exactly [`Self::DIM`] entries.
    pub fn from_position(position: &[f64]) -> Self {
        assert_eq!(position.len(), Self::DIM);
        Self {
            porb_pre: position[0],
            m1_pre: position[1],
            m2: position[2],
            w: position[3],
            theta: position[4],
            phi: position[5],
        }
    }

    /// The vector as a position array in [`Self::NAMES`] order.
    pub fn to_position(self) -> [f64; Self::DIM] {
        [self.porb_pre, self.m1_pre, self.m2, self.w, self.theta, self.phi]
    }
}
