//! Filtered, significance-ranked recall

use crate::index::MemoryIndex;
use crate::tiers::Tiers;
use crate::types::{Emotion, MemoryId, MemoryLayer, MemoryNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

/// Recall filters. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallQuery {
    /// Case-insensitive text matched against content and triggers
    pub text: Option<String>,
    /// Emotion that must be present in the memory's emotional context
    pub emotion: Option<Emotion>,
    /// Themes of which at least one must be tagged on the memory
    pub themes: BTreeSet<String>,
    /// Owner the memory must belong to
    pub user_id: Option<String>,
    /// Restrict recall to a single tier
    pub layer: Option<MemoryLayer>,
    /// Memories scoring below this are dropped
    pub min_significance: f64,
    /// Truncate ranked results to this many
    pub limit: Option<usize>,
}

impl RecallQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn themes<S: Into<String>>(mut self, themes: impl IntoIterator<Item = S>) -> Self {
        self.themes.extend(themes.into_iter().map(Into::into));
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn layer(mut self, layer: MemoryLayer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn min_significance(mut self, min: f64) -> Self {
        self.min_significance = min;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a node passes every non-significance filter
    pub fn matches(&self, node: &MemoryNode) -> bool {
        if let Some(layer) = self.layer {
            if node.layer != layer {
                return false;
            }
        }

        if let Some(emotion) = self.emotion {
            if !node.emotional_context.contains(&emotion) {
                return false;
            }
        }

        if !self.themes.is_empty() && !node.has_any_theme(&self.themes) {
            return false;
        }

        if let Some(ref user_id) = self.user_id {
            if &node.user_id != user_id {
                return false;
            }
        }

        if let Some(ref text) = self.text {
            if !text_matches(node, text) {
                return false;
            }
        }

        true
    }
}

/// Free-text match: the query appears in the serialized content or in
/// one of the triggers
fn text_matches(node: &MemoryNode, text: &str) -> bool {
    let query = text.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    node.serialized_content().to_lowercase().contains(&query)
        || node.triggers.iter().any(|t| t.contains(&query))
}

/// A ranked recall result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallHit {
    /// The memory, as stored after this recall's reinforcement
    pub node: MemoryNode,
    /// Significance used for ranking, computed before reinforcement
    pub significance: f64,
    /// Rank in results (1-based)
    pub rank: usize,
}

/// Rank live nodes against a query
///
/// Returns `(id, significance)` pairs, best first. Index-backed filters
/// narrow the candidate set; every filter is still re-checked against the
/// node itself. Ids the index knows but the tiers do not are skipped.
pub(crate) fn rank(
    tiers: &Tiers,
    index: &MemoryIndex,
    query: &RecallQuery,
    now: DateTime<Utc>,
) -> Vec<(MemoryId, f64)> {
    let mut scored: Vec<(&MemoryNode, f64)> = candidates(tiers, index, query)
        .into_iter()
        .filter(|node| query.matches(node))
        .map(|node| (node, node.significance(now)))
        .filter(|(_, significance)| *significance >= query.min_significance)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.0.timestamp.cmp(&a.0.timestamp))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });

    if let Some(limit) = query.limit {
        scored.truncate(limit);
    }

    scored
        .into_iter()
        .map(|(node, significance)| (node.id.clone(), significance))
        .collect()
}

fn candidates<'a>(tiers: &'a Tiers, index: &MemoryIndex, query: &RecallQuery) -> Vec<&'a MemoryNode> {
    let indexed: Option<HashSet<MemoryId>> = if let Some(ref user_id) = query.user_id {
        Some(index.by_user(user_id).cloned().unwrap_or_default())
    } else if let Some(emotion) = query.emotion {
        Some(index.by_emotion(emotion).cloned().unwrap_or_default())
    } else if !query.themes.is_empty() {
        Some(index.by_any_theme(&query.themes))
    } else {
        None
    };

    match indexed {
        Some(ids) => ids
            .iter()
            .filter_map(|id| {
                let node = tiers.get(id);
                if node.is_none() {
                    tracing::warn!("Index refers to missing memory {}, skipping", id);
                }
                node
            })
            .collect(),
        None => match query.layer {
            Some(layer) => tiers.layer(layer).collect(),
            None => tiers.iter().collect(),
        },
    }
}
