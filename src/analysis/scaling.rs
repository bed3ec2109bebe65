//! Mean scaling of training data and the matching weight inversion.
//!
//! SGD is run on `aqi / mean_aqi`, `fire / mean_fire` and
//! `next_aqi / mean_aqi`. A model fit in that space,
//!
//!   y/ma = w0 + w1 * (a/ma) + w2 * (f/mf)
//!
//! is the original-unit model
//!
//!   y = ma*w0 + w1*a + (ma/mf)*w2*f
//!
//! so `scale_sample` and `unscale_weights` are exact inverses of each other.

use crate::model::{ModelWeights, TrainingSample};

/// Means below this are floored so near-zero series do not blow up the
/// scaled values.
pub const MIN_SCALE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanScaler {
    pub mean_aqi: f64,
    pub mean_fire: f64,
}

impl MeanScaler {
    /// Derives scale factors from the feature side of `samples`.
    /// An empty set gives the floor for both factors.
    pub fn from_samples(samples: &[TrainingSample]) -> Self {
        if samples.is_empty() {
            return Self { mean_aqi: MIN_SCALE, mean_fire: MIN_SCALE };
        }
        let n = samples.len() as f64;
        let mean_aqi = samples.iter().map(|s| s.aqi).sum::<f64>() / n;
        let mean_fire = samples.iter().map(|s| s.fire).sum::<f64>() / n;
        Self {
            mean_aqi: mean_aqi.max(MIN_SCALE),
            mean_fire: mean_fire.max(MIN_SCALE),
        }
    }

    pub fn scale_sample(&self, sample: &TrainingSample) -> TrainingSample {
        TrainingSample {
            aqi: sample.aqi / self.mean_aqi,
            fire: sample.fire / self.mean_fire,
            next_aqi: sample.next_aqi / self.mean_aqi,
        }
    }

    pub fn scale_samples(&self, samples: &[TrainingSample]) -> Vec<TrainingSample> {
        samples.iter().map(|s| self.scale_sample(s)).collect()
    }

    /// Maps weights learned on scaled data back to original units.
    pub fn unscale_weights(&self, scaled: ModelWeights) -> ModelWeights {
        ModelWeights {
            bias: self.mean_aqi * scaled.bias,
            aqi_coef: scaled.aqi_coef,
            fire_coef: (self.mean_aqi / self.mean_fire) * scaled.fire_coef,
        }
    }
}
