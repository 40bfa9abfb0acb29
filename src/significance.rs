//! Significance scoring and reinforcement
//!
//! Significance is never stored. It is recomputed from node state and the
//! current time whenever the store ranks or forgets memories:
//!
//! ```text
//! decay_factor    = max(0.1, 1 - age_hours * decay_rate)
//! reinforce_bonus = min(0.5, reinforcement_count * 0.1)
//! recency_bonus   = max(0.0, 0.3 * (1 - seconds_since_access / 86400))
//! significance    = (emotional_weight * decay_factor + reinforce_bonus + recency_bonus) * layer_mult
//! ```

use crate::types::MemoryNode;
use chrono::{DateTime, Utc};

/// Lowest decay rate reinforcement can reach
pub const MIN_DECAY_RATE: f64 = 0.01;

/// Multiplier applied to the decay rate on each reinforcement
pub const REINFORCE_DECAY_FACTOR: f64 = 0.9;

const MIN_DECAY_FACTOR: f64 = 0.1;
const REINFORCE_STEP: f64 = 0.1;
const MAX_REINFORCE_BONUS: f64 = 0.5;
const MAX_RECENCY_BONUS: f64 = 0.3;
const RECENCY_WINDOW_SECS: f64 = 86_400.0;

/// Significance calculator
pub struct SignificanceScorer;

impl SignificanceScorer {
    /// Current significance of a node
    pub fn score(node: &MemoryNode, now: DateTime<Utc>) -> f64 {
        let age_hours = elapsed_secs(node.timestamp, now) / 3600.0;
        let decay_factor = (1.0 - age_hours * node.decay_rate).max(MIN_DECAY_FACTOR);

        let reinforce_bonus =
            (node.reinforcement_count as f64 * REINFORCE_STEP).min(MAX_REINFORCE_BONUS);

        let since_access = elapsed_secs(node.last_accessed, now);
        let recency_bonus =
            (MAX_RECENCY_BONUS * (1.0 - since_access / RECENCY_WINDOW_SECS)).max(0.0);

        (node.emotional_weight * decay_factor + reinforce_bonus + recency_bonus)
            * node.layer.multiplier()
    }
}

/// Seconds from `from` to `to`, clamped at zero so clock skew never
/// inflates a score
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let elapsed = to - from;
    let secs = match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => elapsed.num_seconds() as f64,
    };
    secs.max(0.0)
}

impl MemoryNode {
    /// Strengthen this memory: slower decay and refreshed recency
    pub fn reinforce(&mut self, now: DateTime<Utc>) {
        self.reinforcement_count = self.reinforcement_count.saturating_add(1);
        self.decay_rate = (self.decay_rate * REINFORCE_DECAY_FACTOR).max(MIN_DECAY_RATE);
        if now > self.last_accessed {
            self.last_accessed = now;
        }
    }

    /// Current significance against the given clock value
    pub fn significance(&self, now: DateTime<Utc>) -> f64 {
        SignificanceScorer::score(self, now)
    }
}
