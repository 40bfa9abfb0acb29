//! Memory maintenance: threshold-driven forgetting
//!
//! Forgetting only ever touches the mid- and long-term tiers. Short-term
//! memories leave through ring-buffer eviction alone.

use crate::error::{MemoryError, Result};
use crate::index::MemoryIndex;
use crate::tiers::Tiers;
use crate::types::{MemoryId, MemoryLayer, MemoryNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one forgetting pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgetReport {
    /// Threshold the pass ran with
    pub threshold: f64,
    /// Mid- and long-term memories examined
    pub checked: usize,
    /// Ids removed, in removal order
    pub forgotten: Vec<MemoryId>,
}

impl ForgetReport {
    pub fn forgotten_count(&self) -> usize {
        self.forgotten.len()
    }
}

/// Reject thresholds outside [0, 1]
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(MemoryError::InvalidArgument(format!(
            "forget threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Remove every forgettable node scoring below `threshold` at `now`
///
/// Removed nodes are purged from the index and returned together with the
/// significance that condemned them.
pub(crate) fn forget_below(
    tiers: &mut Tiers,
    index: &mut MemoryIndex,
    threshold: f64,
    now: DateTime<Utc>,
) -> (usize, Vec<(MemoryNode, f64)>) {
    let mut checked = 0;
    let mut condemned: Vec<(MemoryId, f64)> = Vec::new();

    for layer in MemoryLayer::ALL.iter().filter(|l| l.can_forget()) {
        for node in tiers.layer(*layer) {
            checked += 1;
            let significance = node.significance(now);
            if significance < threshold {
                condemned.push((node.id.clone(), significance));
            }
        }
    }

    // Oldest first, so the forgotten log reads chronologically
    condemned.sort_by(|a, b| {
        let ta = tiers.get(&a.0).map(|n| n.timestamp);
        let tb = tiers.get(&b.0).map(|n| n.timestamp);
        ta.cmp(&tb).then_with(|| a.0.cmp(&b.0))
    });

    let mut removed = Vec::with_capacity(condemned.len());
    for (id, significance) in condemned {
        if let Some(node) = tiers.remove_forgettable(&id) {
            index.remove(&node);
            tracing::debug!("Forgot {} memory {} (significance {:.4})", node.layer, id, significance);
            removed.push((node, significance));
        }
    }

    (checked, removed)
}
