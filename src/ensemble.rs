//! The affine-invariant walker ensemble and its stretch proposal.

use anyhow::{bail, Result};
use itertools::izip;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;

use crate::error::ConfigError;
use crate::model::Model;

/// The Goodman & Weare stretch proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchMove {
    /// Stretch scale `a`; proposals stretch or contract by `z in [1/a, a]`.
    pub scale: f64,
}

impl Default for StretchMove {
    fn default() -> Self {
        Self { scale: 2.0 }
    }
}

impl StretchMove {
    /// Draw the stretch factor, with density proportional to `1 / sqrt(z)`.
    pub fn sample_z<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        let a = self.scale;
        ((a - 1.0) * u + 1.0).powi(2) / a
    }
}

/// Strict comparison, so a zero-probability proposal never passes, even
/// against a uniform draw of exactly zero.
fn accepts(ln_accept: f64, ln_draw: f64) -> bool {
    ln_accept > ln_draw
}

/// `anchor + z * (walker - anchor)`: the proposal on the line through the
/// walker and its anchor from the complementary half-ensemble.
fn stretch(walker: &[f64], anchor: &[f64], z: f64) -> Vec<f64> {
    walker
        .iter()
        .zip(anchor)
        .map(|(&x, &c)| c + z * (x - c))
        .collect()
}

/// Per-dimension uniform offset ranges used to seed walkers around the
/// initial guess.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkerSpread {
    offsets: Vec<(f64, f64)>,
}

impl WalkerSpread {
    /// Offsets must satisfy `lo < hi` in every dimension; spreads come
    /// straight from user configuration, so this is validated.
    pub fn new(offsets: Vec<(f64, f64)>) -> Result<Self, ConfigError> {
        for (dim, &(lo, hi)) in offsets.iter().enumerate() {
            if !(lo < hi) {
                return Err(ConfigError::InvalidRange {
                    key: format!("spread[{dim}]"),
                    lo,
                    hi,
                });
            }
        }
        Ok(Self { offsets })
    }

    pub fn dim(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[(f64, f64)] {
        &self.offsets
    }
}

/// Walker positions and their cached log-probabilities.
#[derive(Debug, Clone)]
pub struct Ensemble {
    positions: Vec<Vec<f64>>,
    log_probs: Vec<f64>,
    accepted: Vec<u64>,
    steps: u64,
}

impl Ensemble {
    /// Seed `walkers` walkers around `guess` and evaluate their starting
    /// log-probabilities in parallel.
    pub fn init<M, R>(
        model: &M,
        guess: &[f64],
        spread: &WalkerSpread,
        walkers: usize,
        rng: &mut R,
    ) -> Result<Self>
    where
        M: Model,
        R: Rng + ?Sized,
    {
        if walkers < 2 {
            bail!("need at least 2 walkers, got {walkers}");
        }
        if guess.len() != model.dim() {
            bail!(
                "initial guess has {} entries, the model has {} dimensions",
                guess.len(),
                model.dim()
            );
        }
        if spread.dim() != model.dim() {
            bail!(
                "walker spread has {} entries, the model has {} dimensions",
                spread.dim(),
                model.dim()
            );
        }
        let offsets = spread
            .offsets()
            .iter()
            .map(|&(lo, hi)| Uniform::new(lo, hi))
            .collect::<Result<Vec<_>, _>>()?;
        let positions: Vec<Vec<f64>> = (0..walkers)
            .map(|_| {
                guess
                    .iter()
                    .zip(&offsets)
                    .map(|(&g, offset)| g + offset.sample(rng))
                    .collect()
            })
            .collect();
        let log_probs: Vec<f64> = positions.par_iter().map(|p| model.log_prob(p)).collect();
        let accepted = vec![0; walkers];
        Ok(Self {
            positions,
            log_probs,
            accepted,
            steps: 0,
        })
    }

    pub fn walkers(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec<f64>] {
        &self.positions
    }

    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    /// Completed proposal rounds.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Mean acceptance rate over all walkers and steps so far.
    pub fn acceptance_rate(&self) -> f64 {
        if self.steps == 0 {
            return 0.0;
        }
        let total: u64 = self.accepted.iter().sum();
        total as f64 / (self.steps as f64 * self.walkers() as f64)
    }

    /// Mean log-probability over walkers currently at finite points.
    pub fn mean_log_prob(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &log_prob in &self.log_probs {
            if log_prob.is_finite() {
                sum += log_prob;
                count += 1;
            }
        }
        if count == 0 {
            f64::NEG_INFINITY
        } else {
            sum / count as f64
        }
    }

    /// Walkers currently sitting at zero-probability points.
    pub fn stuck_walkers(&self) -> usize {
        self.log_probs.iter().filter(|l| !l.is_finite()).count()
    }

    /// Advance every walker once; returns the number of accepted proposals.
    ///
    /// The two half-ensembles update in sequence, each walker proposing
    /// along the line to a random member of the other half. Randomness is
    /// drawn serially and only the log-probability evaluations fan out to
    /// the thread pool, so a run is reproducible however the pool schedules
    /// them.
    pub fn step<M, R>(&mut self, model: &M, proposal: &StretchMove, rng: &mut R) -> usize
    where
        M: Model,
        R: Rng + ?Sized,
    {
        let n = self.walkers();
        let half = n / 2;
        let dim = model.dim() as f64;
        let mut accepted_now = 0;
        for (lo, hi, other_lo, other_hi) in [(0, half, half, n), (half, n, 0, half)] {
            let mut zs = Vec::with_capacity(hi - lo);
            let mut proposals = Vec::with_capacity(hi - lo);
            for k in lo..hi {
                let z = proposal.sample_z(rng);
                let anchor = &self.positions[rng.random_range(other_lo..other_hi)];
                proposals.push(stretch(&self.positions[k], anchor, z));
                zs.push(z);
            }
            let scores: Vec<f64> = proposals.par_iter().map(|p| model.log_prob(p)).collect();
            for (k, z, position, score) in izip!(lo..hi, zs, proposals, scores) {
                let ln_accept = (dim - 1.0) * z.ln() + score - self.log_probs[k];
                if accepts(ln_accept, rng.random::<f64>().ln()) {
                    self.positions[k] = position;
                    self.log_probs[k] = score;
                    self.accepted[k] += 1;
                    accepted_now += 1;
                }
            }
        }
        self.steps += 1;
        accepted_now
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;

    struct Flat {
        dim: usize,
    }

    impl Model for Flat {
        fn dim(&self) -> usize {
            self.dim
        }

        fn log_prob(&self, _position: &[f64]) -> f64 {
            0.0
        }
    }

    struct Gauss;

    impl Model for Gauss {
        fn dim(&self) -> usize {
            2
        }

        fn log_prob(&self, position: &[f64]) -> f64 {
            -0.5 * position.iter().map(|x| x * x).sum::<f64>()
        }
    }

    struct HalfPlane;

    impl Model for HalfPlane {
        fn dim(&self) -> usize {
            2
        }

        fn log_prob(&self, position: &[f64]) -> f64 {
            if position[0] < 0.0 {
                f64::NEG_INFINITY
            } else {
                0.0
            }
        }
    }

    fn spread2() -> WalkerSpread {
        WalkerSpread::new(vec![(-1.0, 1.0), (-1.0, 1.0)]).unwrap()
    }

    #[test]
    fn stretch_factor_stays_in_bounds() {
        let proposal = StretchMove::default();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..1000 {
            let z = proposal.sample_z(&mut rng);
            assert!((0.5..=2.0).contains(&z), "z = {z}");
        }
    }

    #[test]
    fn stretch_interpolates_towards_the_anchor() {
        let proposed = stretch(&[1.0, 2.0], &[3.0, 4.0], 0.5);
        assert_eq!(proposed, vec![2.0, 3.0]);
    }

    #[test]
    fn zero_probability_proposals_are_never_accepted() {
        // -inf ratio against a draw of exactly zero is the boundary case.
        assert!(!accepts(f64::NEG_INFINITY, f64::NEG_INFINITY));
        assert!(!accepts(f64::NEG_INFINITY, -3.0));
        // A stuck walker proposing another zero-probability point: the
        // ratio is NaN and the walker stays put.
        assert!(!accepts(f64::NAN, -3.0));
        // Uphill and stuck-walker-escape moves still pass.
        assert!(accepts(0.0, -0.5));
        assert!(accepts(f64::INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn spread_rejects_inverted_ranges() {
        let err = WalkerSpread::new(vec![(-1.0, 1.0), (2.0, 2.0)]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidRange { lo: 2.0, hi: 2.0, .. }
        ));
    }

    #[test]
    fn init_places_walkers_inside_the_spread() {
        let model = Flat { dim: 2 };
        let spread = WalkerSpread::new(vec![(-1.0, 1.0), (2.0, 3.0)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        let ensemble = Ensemble::init(&model, &[10.0, 20.0], &spread, 8, &mut rng).unwrap();
        assert_eq!(ensemble.walkers(), 8);
        for position in ensemble.positions() {
            assert!((9.0..11.0).contains(&position[0]));
            assert!((22.0..23.0).contains(&position[1]));
        }
        assert!(ensemble.log_probs().iter().all(|&l| l == 0.0));
    }

    #[test]
    fn init_rejects_mismatched_guess() {
        let model = Flat { dim: 2 };
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(Ensemble::init(&model, &[1.0], &spread2(), 8, &mut rng).is_err());
    }

    #[test]
    fn step_is_deterministic_for_a_fixed_seed() {
        let model = Gauss;
        let mut rng_a = SmallRng::seed_from_u64(5);
        let mut rng_b = SmallRng::seed_from_u64(5);
        let mut a = Ensemble::init(&model, &[3.0, -2.0], &spread2(), 8, &mut rng_a).unwrap();
        let mut b = Ensemble::init(&model, &[3.0, -2.0], &spread2(), 8, &mut rng_b).unwrap();
        for _ in 0..50 {
            a.step(&model, &StretchMove::default(), &mut rng_a);
            b.step(&model, &StretchMove::default(), &mut rng_b);
        }
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.log_probs(), b.log_probs());
    }

    #[test]
    fn ensemble_climbs_towards_the_mode() {
        let model = Gauss;
        let mut rng = SmallRng::seed_from_u64(7);
        let mut ensemble = Ensemble::init(&model, &[6.0, -6.0], &spread2(), 8, &mut rng).unwrap();
        let start = ensemble.mean_log_prob();
        for _ in 0..200 {
            ensemble.step(&model, &StretchMove::default(), &mut rng);
        }
        assert!(ensemble.mean_log_prob() > start);
        let acceptance = ensemble.acceptance_rate();
        assert!(acceptance > 0.0 && acceptance <= 1.0, "rate = {acceptance}");
        assert_eq!(ensemble.steps(), 200);
    }

    #[test]
    fn stuck_walkers_are_counted() {
        let model = HalfPlane;
        let spread = WalkerSpread::new(vec![(-0.1, 0.1), (-0.1, 0.1)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        let ensemble = Ensemble::init(&model, &[-10.0, 0.0], &spread, 6, &mut rng).unwrap();
        assert_eq!(ensemble.stuck_walkers(), 6);
        assert_eq!(ensemble.mean_log_prob(), f64::NEG_INFINITY);
    }
}
