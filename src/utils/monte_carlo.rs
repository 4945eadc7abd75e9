//! Truncated-normal Monte Carlo estimate of a prop's hit probability.
//!
//! The historical sample is summarised by its mean and sample standard deviation,
//! a normal distribution truncated to `[0, mean + 4 * std]` is fitted to it, and
//! the probability is the share of simulated games clearing the line.

use crate::error::{PropError, PropResult};
use crate::models::Direction;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, warn};

pub const DEFAULT_DRAWS: usize = 10_000;
pub const DEFAULT_SEED: u64 = 42;

/// Standard deviation used when every historical value is identical
const STD_DEV_FLOOR: f64 = 0.1;

/// Number of simulated games and the seed that makes them reproducible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub draws: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            draws: DEFAULT_DRAWS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Summary statistics of the historical values the simulation was fitted on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub probability: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// 2.5th and 97.5th percentiles of the simulated values
    pub interval: (f64, f64),
    pub draws: usize,
    pub historical: SampleSummary,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `ddof` degrees of freedom removed (1 = sample, 0 = population)
fn std_dev(values: &[f64], ddof: usize) -> f64 {
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - ddof) as f64).sqrt()
}

/// Percentile of already sorted values, interpolating linearly between neighbours
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn summarize(values: &[f64]) -> SampleSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    SampleSummary {
        mean: mean(values),
        median: percentile(&sorted, 50.0),
        std_dev: std_dev(values, 1),
        count: values.len(),
    }
}

/// Simulate `config.draws` games from the player's history and count how many land
/// strictly over (or under) `threshold`
pub fn simulate(
    values: &[f64],
    threshold: f64,
    direction: Direction,
    config: SimulationConfig,
) -> PropResult<SimulationResult> {
    if values.len() < 2 {
        return Err(PropError::InsufficientSample {
            required: 2,
            found: values.len(),
        });
    }
    if config.draws == 0 {
        return Err(PropError::InvalidInput(
            "number of simulated draws must be positive".to_string(),
        ));
    }
    if !threshold.is_finite() || values.iter().any(|v| !v.is_finite()) {
        return Err(PropError::InvalidInput(
            "simulation inputs must be finite numbers".to_string(),
        ));
    }

    let historical = summarize(values);
    let center = historical.mean;
    let mut spread = historical.std_dev;
    if spread == 0.0 {
        warn!("Historical values have zero spread, using {}", STD_DEV_FLOOR);
        spread = STD_DEV_FLOOR;
    }

    let lower = 0.0;
    let upper = center + 4.0 * spread;
    if upper <= lower {
        return Err(PropError::InvalidInput(format!(
            "cannot fit a non-negative distribution to values averaging {:.2}",
            center
        )));
    }

    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| PropError::InvalidInput(format!("normal distribution: {}", e)))?;
    let cdf_lower = standard.cdf((lower - center) / spread);
    let cdf_upper = standard.cdf((upper - center) / spread);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut simulated: Vec<f64> = (0..config.draws)
        .map(|_| {
            let u = cdf_lower + rng.gen::<f64>() * (cdf_upper - cdf_lower);
            let x = center + spread * standard.inverse_cdf(u);
            x.clamp(lower, upper)
        })
        .collect();

    let satisfied = simulated
        .iter()
        .filter(|v| direction.is_satisfied(**v, threshold))
        .count();
    let sim_mean = mean(&simulated);
    let sim_std = std_dev(&simulated, 0);
    simulated.sort_by(f64::total_cmp);

    let result = SimulationResult {
        probability: satisfied as f64 / config.draws as f64,
        mean: sim_mean,
        median: percentile(&simulated, 50.0),
        std_dev: sim_std,
        interval: (percentile(&simulated, 2.5), percentile(&simulated, 97.5)),
        draws: config.draws,
        historical,
    };
    debug!(
        "Simulated {} draws: mean={:.2}, std={:.2}, p={:.3}",
        result.draws, result.mean, result.std_dev, result.probability
    );
    Ok(result)
}
