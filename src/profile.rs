//! Per-user personalization statistics
//!
//! Counts are cumulative over every memory ever added for a user and are
//! not decremented when memories are forgotten or evicted.

use crate::types::{Emotion, MemoryNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Emotional and thematic signal for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Occurrences of each emotion tag
    pub emotions: BTreeMap<Emotion, u64>,
    /// Occurrences of each thematic tag
    pub themes: BTreeMap<String, u64>,
    /// Number of memories recorded for the user
    #[serde(default)]
    pub memory_count: u64,
}

impl UserProfile {
    fn record(&mut self, node: &MemoryNode) {
        for emotion in &node.emotional_context {
            *self.emotions.entry(*emotion).or_insert(0) += 1;
        }
        for theme in &node.thematic_tags {
            *self.themes.entry(theme.clone()).or_insert(0) += 1;
        }
        self.memory_count += 1;
    }

    /// Most frequent emotions, ties broken by name
    pub fn top_emotions(&self, n: usize) -> Vec<(Emotion, u64)> {
        let mut ranked: Vec<(Emotion, u64)> = self.emotions.iter().map(|(e, c)| (*e, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        ranked.truncate(n);
        ranked
    }

    /// Most frequent themes, ties broken by name
    pub fn top_themes(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> =
            self.themes.iter().map(|(t, c)| (t.clone(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Aggregates profiles as memories are added
#[derive(Debug, Clone, Default)]
pub struct ProfileAggregator {
    profiles: HashMap<String, UserProfile>,
}

impl ProfileAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = (String, UserProfile)>) -> Self {
        Self {
            profiles: profiles.into_iter().collect(),
        }
    }

    pub fn record(&mut self, node: &MemoryNode) {
        self.profiles
            .entry(node.user_id.clone())
            .or_default()
            .record(node);
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles keyed by user, in stable order
    pub fn to_map(&self) -> BTreeMap<String, UserProfile> {
        self.profiles
            .iter()
            .map(|(user, profile)| (user.clone(), profile.clone()))
            .collect()
    }
}
