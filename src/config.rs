//! Store configuration

use crate::error::{MemoryError, Result};
use crate::types::MemoryLayer;
use serde::{Deserialize, Serialize};

/// Configuration for a layered memory store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Ring buffer size of the short-term tier
    pub short_term_capacity: usize,
    /// Base decay rate per hour for short-term memories
    pub base_decay_short: f64,
    /// Base decay rate per hour for mid-term memories
    pub base_decay_mid: f64,
    /// Base decay rate per hour for long-term memories
    pub base_decay_long: f64,
    /// Maximum number of triggers derived from content
    pub max_triggers: usize,
    /// Minimum length of a derived trigger keyword
    pub min_trigger_len: usize,
    /// Number of top recall results reinforced per recall
    pub recall_reinforce_top: usize,
    /// Threshold used by `forget()` when none is given
    pub default_forget_threshold: f64,
    /// Buffer size of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: 50,
            base_decay_short: 0.5,
            base_decay_mid: 0.1,
            base_decay_long: 0.02,
            max_triggers: 10,
            min_trigger_len: 4,
            recall_reinforce_top: 5,
            default_forget_threshold: 0.1,
            event_capacity: 256,
        }
    }
}

impl MemoryConfig {
    /// Base decay rate for a layer, before emotional weighting
    pub fn base_decay(&self, layer: MemoryLayer) -> f64 {
        match layer {
            MemoryLayer::ShortTerm => self.base_decay_short,
            MemoryLayer::MidTerm => self.base_decay_mid,
            MemoryLayer::LongTerm => self.base_decay_long,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_term_capacity == 0 {
            return Err(MemoryError::InvalidArgument(
                "short_term_capacity must be at least 1".to_string(),
            ));
        }
        for layer in MemoryLayer::ALL {
            let base = self.base_decay(*layer);
            if !base.is_finite() || base <= 0.0 {
                return Err(MemoryError::InvalidArgument(format!(
                    "base decay for {} must be positive, got {}",
                    layer, base
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.default_forget_threshold) {
            return Err(MemoryError::InvalidArgument(format!(
                "default_forget_threshold must be within [0, 1], got {}",
                self.default_forget_threshold
            )));
        }
        if self.event_capacity == 0 {
            return Err(MemoryError::InvalidArgument(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for memory config
pub struct MemoryConfigBuilder {
    config: MemoryConfig,
}

impl MemoryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MemoryConfig::default(),
        }
    }

    pub fn short_term_capacity(mut self, capacity: usize) -> Self {
        self.config.short_term_capacity = capacity;
        self
    }

    pub fn base_decay(mut self, layer: MemoryLayer, rate: f64) -> Self {
        match layer {
            MemoryLayer::ShortTerm => self.config.base_decay_short = rate,
            MemoryLayer::MidTerm => self.config.base_decay_mid = rate,
            MemoryLayer::LongTerm => self.config.base_decay_long = rate,
        }
        self
    }

    pub fn max_triggers(mut self, max: usize) -> Self {
        self.config.max_triggers = max;
        self
    }

    pub fn recall_reinforce_top(mut self, top: usize) -> Self {
        self.config.recall_reinforce_top = top;
        self
    }

    pub fn default_forget_threshold(mut self, threshold: f64) -> Self {
        self.config.default_forget_threshold = threshold;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build and validate the config
    pub fn build(self) -> Result<MemoryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for MemoryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
