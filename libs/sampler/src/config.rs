//! Sampling parameters

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest temperature used for scaling; lower values are clamped up to it
pub const MIN_TEMPERATURE: f32 = 0.01;

/// Smallest nucleus threshold; non-positive values are clamped up to it
pub const MIN_TOP_P: f32 = 1e-6;

/// Error type for loading and saving sampling configurations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed or mistyped JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Temperature / top-k / top-p configuration for a ranking pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Softmax temperature (> 0)
    pub temperature: f32,
    /// Number of highest-scoring candidates kept
    pub top_k: usize,
    /// Cumulative probability threshold for the nucleus, in (0, 1]
    pub top_p: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 10,
            top_p: 0.9,
        }
    }
}

impl SamplingConfig {
    pub fn new(temperature: f32, top_k: usize, top_p: f32) -> Self {
        Self {
            temperature,
            top_k,
            top_p,
        }
    }

    /// Near-deterministic decoding: one candidate, tiny temperature
    pub fn greedy() -> Self {
        Self {
            temperature: MIN_TEMPERATURE,
            top_k: 1,
            top_p: 1.0,
        }
    }

    /// Flat distribution over a wide candidate set
    pub fn creative() -> Self {
        Self {
            temperature: 1.3,
            top_k: 40,
            top_p: 0.98,
        }
    }

    /// Temperature actually used for scaling. Never zero, never NaN.
    pub fn effective_temperature(&self) -> f32 {
        if self.temperature.is_nan() {
            return MIN_TEMPERATURE;
        }
        self.temperature.max(MIN_TEMPERATURE)
    }

    /// Candidate count actually kept (at least one)
    pub fn effective_top_k(&self) -> usize {
        self.top_k.max(1)
    }

    /// Nucleus threshold actually applied, clamped into (0, 1]
    pub fn effective_top_p(&self) -> f32 {
        if self.top_p.is_nan() {
            return 1.0;
        }
        self.top_p.clamp(MIN_TOP_P, 1.0)
    }

    /// True when any field falls outside its documented range and will be clamped
    pub fn needs_clamping(&self) -> bool {
        self.effective_temperature() != self.temperature
            || self.effective_top_k() != self.top_k
            || self.effective_top_p() != self.top_p
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write to a JSON file, readable by [`load`](Self::load)
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
