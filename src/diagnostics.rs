//! Chain diagnostics: autocorrelation times and the stopping rule.

use itertools::Itertools;

/// Normalized autocorrelation of one series up to `max_lag` inclusive.
///
/// A constant series has no correlation structure to speak of; it reports
/// zero at every positive lag.
fn autocorrelation(series: &[f64], max_lag: usize) -> Vec<f64> {
    let n = series.len();
    let mean = series.iter().sum::<f64>() / n as f64;
    let var = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let mut rho = vec![0.0; max_lag + 1];
    if var == 0.0 || !var.is_finite() {
        rho[0] = 1.0;
        return rho;
    }
    for (lag, r) in rho.iter_mut().enumerate() {
        let mut sum = 0.0;
        for t in 0..n - lag {
            sum += (series[t] - mean) * (series[t + lag] - mean);
        }
        *r = sum / (n as f64 * var);
    }
    rho
}

/// Integrated autocorrelation time of one parameter, averaged over walkers.
///
/// Each walker's series contributes its own autocorrelation estimate; the
/// walker-averaged function is summed over its initial positive sequence,
/// `tau = 1 + 2 * sum(rho)`. Series are truncated to the shortest walker
/// and lags are capped at `min(n / 2, 100)`.
pub fn integrated_autocorr_time(walker_series: &[Vec<f64>]) -> f64 {
    let n = walker_series.iter().map(|s| s.len()).min().unwrap_or(0);
    if n < 2 {
        return 1.0;
    }
    let max_lag = (n / 2).min(100);
    let mut mean_rho = vec![0.0; max_lag + 1];
    for series in walker_series {
        for (m, r) in mean_rho.iter_mut().zip(autocorrelation(&series[..n], max_lag)) {
            *m += r;
        }
    }
    let walkers = walker_series.len() as f64;
    let mut tau = 1.0;
    for entry in &mean_rho[1..] {
        let rho = entry / walkers;
        if rho <= 0.0 {
            break;
        }
        tau += 2.0 * rho;
    }
    tau
}

/// The stopping rule: every parameter's chain must be long relative to its
/// autocorrelation time, and the estimates must have stopped drifting
/// between consecutive checks.
#[derive(Debug, Clone)]
pub struct ConvergenceCheck {
    /// Required chain length as a multiple of tau.
    pub factor: f64,
    /// Allowed relative change of tau between checks.
    pub rel_tol: f64,
    previous: Option<Vec<f64>>,
}

impl Default for ConvergenceCheck {
    fn default() -> Self {
        Self::new(100.0, 0.01)
    }
}

impl ConvergenceCheck {
    pub fn new(factor: f64, rel_tol: f64) -> Self {
        Self {
            factor,
            rel_tol,
            previous: None,
        }
    }

    /// Feed the latest per-parameter estimates; true once both criteria
    /// hold. The first call can never report convergence because there is
    /// nothing to compare against yet.
    pub fn update(&mut self, tau: &[f64], iteration: u64) -> bool {
        let long_enough = tau.iter().all(|&t| t * self.factor < iteration as f64);
        let stable = match &self.previous {
            Some(previous) => previous
                .iter()
                .zip_eq(tau)
                .all(|(&old, &new)| ((old - new) / new).abs() < self.rel_tol),
            None => false,
        };
        self.previous = Some(tau.to_vec());
        long_enough && stable
    }
}
