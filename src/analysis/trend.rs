//! Linear next-day AQI model fit by single-sample SGD.
//!
//! The model is `next_aqi = w0 + w1 * aqi + w2 * fire`. Training draws one
//! sample per step, uniformly and with replacement, and applies the
//! squared-error gradient of that sample alone. There is no convergence
//! check: the caller fixes the number of steps.
//!
//! # Randomness injection
//! `fit` takes the random source as a parameter. Production seeds it from
//! entropy (or `forecast.random_seed`); tests pass a `StdRng` with a fixed
//! seed so weight trajectories are exactly repeatable.

use rand::Rng;

use crate::model::{ModelWeights, TrainingSample};

/// Learning rate used when the caller has no preference.
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;

/// Initial weights: no bias, half persistence of today's AQI, and a
/// positive fire effect.
pub const INITIAL_WEIGHTS: ModelWeights = ModelWeights {
    bias: 0.0,
    aqi_coef: 0.5,
    fire_coef: 0.5,
};

impl ModelWeights {
    /// `bias + aqi_coef * aqi + fire_coef * fire`
    pub fn predict(&self, aqi: f64, fire: f64) -> f64 {
        self.bias + self.aqi_coef * aqi + self.fire_coef * fire
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendModel {
    weights: ModelWeights,
}

impl Default for TrendModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendModel {
    pub fn new() -> Self {
        Self::with_weights(INITIAL_WEIGHTS)
    }

    pub fn with_weights(weights: ModelWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ModelWeights {
        self.weights
    }

    pub fn predict(&self, aqi: f64, fire: f64) -> f64 {
        self.weights.predict(aqi, fire)
    }

    /// Runs `steps` single-sample SGD updates over `samples`.
    ///
    /// An empty sample set leaves the weights untouched and consumes
    /// nothing from `rng`.
    pub fn fit<R: Rng>(
        &mut self,
        samples: &[TrainingSample],
        learning_rate: f64,
        steps: usize,
        rng: &mut R,
    ) {
        if samples.is_empty() {
            return;
        }

        for _ in 0..steps {
            let sample = samples[rng.gen_range(0..samples.len())];
            let err = self.predict(sample.aqi, sample.fire) - sample.next_aqi;

            let w = &mut self.weights;
            w.bias -= learning_rate * 2.0 * err;
            w.aqi_coef -= learning_rate * 2.0 * err * sample.aqi;
            w.fire_coef -= learning_rate * 2.0 * err * sample.fire;
        }
    }

    /// Mean squared error of the current weights over `samples`.
    /// Returns `None` for an empty set.
    pub fn mse(&self, samples: &[TrainingSample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let total: f64 = samples
            .iter()
            .map(|s| {
                let err = self.predict(s.aqi, s.fire) - s.next_aqi;
                err * err
            })
            .sum();
        Some(total / samples.len() as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(aqi: f64, fire: f64, next_aqi: f64) -> TrainingSample {
        TrainingSample { aqi, fire, next_aqi }
    }

    #[test]
    fn test_new_model_starts_at_prior() {
        let model = TrendModel::new();
        assert_eq!(model.weights(), INITIAL_WEIGHTS);
        assert_eq!(model.predict(10.0, 4.0), 7.0);
    }

    #[test]
    fn test_predict_is_exact_linear_combination() {
        let weights = ModelWeights { bias: 1.5, aqi_coef: -0.25, fire_coef: 2.0 };
        let model = TrendModel::with_weights(weights);
        let (a, f) = (40.0, 3.0);
        assert_eq!(model.predict(a, f), 1.5 + -0.25 * a + 2.0 * f);
        assert_eq!(model.predict(a, f), model.predict(a, f));
        assert_eq!(model.weights(), weights);
    }

    #[test]
    fn test_fit_on_empty_set_is_noop() {
        let mut model = TrendModel::new();
        let mut rng = StdRng::seed_from_u64(7);
        model.fit(&[], 0.1, 10_000, &mut rng);
        assert_eq!(model.weights(), INITIAL_WEIGHTS);
    }

    #[test]
    fn test_single_step_applies_squared_error_gradient() {
        // One sample, so the draw is deterministic regardless of seed.
        let mut model = TrendModel::new();
        let mut rng = StdRng::seed_from_u64(0);
        model.fit(&[sample(2.0, 1.0, 3.0)], 0.1, 1, &mut rng);

        // prediction = 0 + 0.5*2 + 0.5*1 = 1.5, err = -1.5
        let w = model.weights();
        assert!((w.bias - 0.3).abs() < 1e-12);
        assert!((w.aqi_coef - 1.1).abs() < 1e-12);
        assert!((w.fire_coef - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_seed_gives_identical_trajectories() {
        let samples = vec![
            sample(1.0, 0.0, 1.1),
            sample(1.1, 0.5, 0.9),
            sample(0.9, 1.0, 1.2),
            sample(1.2, 0.0, 1.0),
        ];

        let mut a = TrendModel::new();
        let mut b = TrendModel::new();
        a.fit(&samples, 0.01, 500, &mut StdRng::seed_from_u64(42));
        b.fit(&samples, 0.01, 500, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_fit_reduces_error_on_persistent_series() {
        // next_aqi == aqi: the best model is w1 = 1, w0 = w2 = 0.
        let samples: Vec<TrainingSample> = (0..10)
            .map(|i| {
                let a = 0.5 + i as f64 * 0.1;
                sample(a, 0.0, a)
            })
            .collect();

        let mut model = TrendModel::new();
        let before = model.mse(&samples).unwrap();
        model.fit(&samples, 0.05, 5000, &mut StdRng::seed_from_u64(1));
        let after = model.mse(&samples).unwrap();

        assert!(after < before, "mse should drop: {} -> {}", before, after);
        assert!(after < 1e-3, "mse should be near zero, got {}", after);
    }

    #[test]
    fn test_mse_of_empty_set_is_none() {
        assert_eq!(TrendModel::new().mse(&[]), None);
    }
}
