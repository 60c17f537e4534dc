//! Exploration noise applied to selected actions before they are replied.

use super::LearningError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

/// Perturbs a batch of actions in place.
pub trait NoiseExplorer: Send {
    fn perturb(&mut self, actions: &mut [Vec<f32>]);
}

fn validate_bounds(min: Option<f32>, max: Option<f32>) -> Result<(), LearningError> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(LearningError::InvalidConfig(format!(
                "min_action {} exceeds max_action {}",
                lo, hi
            )));
        }
    }
    Ok(())
}

fn clip(x: f32, min: Option<f32>, max: Option<f32>) -> f32 {
    let x = min.map_or(x, |lo| x.max(lo));
    max.map_or(x, |hi| x.min(hi))
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Configuration for [`GaussianNoiseExplorer`].
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoiseConfig {
    pub mean: f32,
    pub stddev: f32,
    /// Lower clip bound applied after adding noise.
    pub min_action: Option<f32>,
    /// Upper clip bound applied after adding noise.
    pub max_action: Option<f32>,
    /// Fixed seed for reproducible noise.
    pub seed: Option<u64>,
}

impl Default for GaussianNoiseConfig {
    fn default() -> Self {
        Self {
            mean: 0.0,
            stddev: 0.1,
            min_action: None,
            max_action: None,
            seed: None,
        }
    }
}

impl GaussianNoiseConfig {
    pub fn new(mean: f32, stddev: f32) -> Self {
        Self {
            mean,
            stddev,
            ..Default::default()
        }
    }

    /// Clip perturbed actions to `[min, max]`.
    pub fn with_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_action = Some(min);
        self.max_action = Some(max);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Adds i.i.d. Gaussian noise to every action component.
pub struct GaussianNoiseExplorer {
    config: GaussianNoiseConfig,
    normal: Normal<f32>,
    rng: StdRng,
}

impl GaussianNoiseExplorer {
    pub fn new(config: GaussianNoiseConfig) -> Result<Self, LearningError> {
        validate_bounds(config.min_action, config.max_action)?;
        let normal = Normal::new(config.mean, config.stddev)
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))?;
        let rng = rng_from(config.seed);
        Ok(Self {
            config,
            normal,
            rng,
        })
    }

    pub fn config(&self) -> &GaussianNoiseConfig {
        &self.config
    }
}

impl NoiseExplorer for GaussianNoiseExplorer {
    fn perturb(&mut self, actions: &mut [Vec<f32>]) {
        for row in actions.iter_mut() {
            for a in row.iter_mut() {
                let noisy = *a + self.normal.sample(&mut self.rng);
                *a = clip(noisy, self.config.min_action, self.config.max_action);
            }
        }
    }
}

/// Configuration for [`UniformNoiseExplorer`].
#[derive(Debug, Clone, PartialEq)]
pub struct UniformNoiseConfig {
    /// Inclusive lower noise bound.
    pub low: f32,
    /// Exclusive upper noise bound.
    pub high: f32,
    pub min_action: Option<f32>,
    pub max_action: Option<f32>,
    pub seed: Option<u64>,
}

impl UniformNoiseConfig {
    pub fn new(low: f32, high: f32) -> Self {
        Self {
            low,
            high,
            min_action: None,
            max_action: None,
            seed: None,
        }
    }

    pub fn with_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_action = Some(min);
        self.max_action = Some(max);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Adds noise drawn uniformly from `[low, high)` to every action component.
pub struct UniformNoiseExplorer {
    config: UniformNoiseConfig,
    uniform: Uniform<f32>,
    rng: StdRng,
}

impl UniformNoiseExplorer {
    pub fn new(config: UniformNoiseConfig) -> Result<Self, LearningError> {
        validate_bounds(config.min_action, config.max_action)?;
        if !(config.low < config.high) {
            return Err(LearningError::InvalidConfig(format!(
                "uniform noise needs low < high, got [{}, {})",
                config.low, config.high
            )));
        }
        let uniform = Uniform::new(config.low, config.high);
        let rng = rng_from(config.seed);
        Ok(Self {
            config,
            uniform,
            rng,
        })
    }
}

impl NoiseExplorer for UniformNoiseExplorer {
    fn perturb(&mut self, actions: &mut [Vec<f32>]) {
        for row in actions.iter_mut() {
            for a in row.iter_mut() {
                let noisy = *a + self.uniform.sample(&mut self.rng);
                *a = clip(noisy, self.config.min_action, self.config.max_action);
            }
        }
    }
}
