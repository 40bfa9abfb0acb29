//! Inverted indexes over memory nodes
//!
//! The index holds ids only. Nodes stay owned by the tiers, so every id
//! resolved through the index has to be looked up again in the store.
//! Recall narrows candidates through the user, emotion and theme indexes.
//! The trigger index serves exact keyword lookups
//! (`LayeredMemory::find_by_trigger`); substring text queries scan instead.

use crate::types::{Content, Emotion, MemoryId, MemoryNode};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Emotion, theme, user and trigger indexes
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    by_emotion: HashMap<Emotion, HashSet<MemoryId>>,
    by_theme: HashMap<String, HashSet<MemoryId>>,
    by_user: HashMap<String, HashSet<MemoryId>>,
    by_trigger: HashMap<String, HashSet<MemoryId>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from scratch
    pub fn rebuild<'a>(nodes: impl IntoIterator<Item = &'a MemoryNode>) -> Self {
        let mut index = Self::new();
        for node in nodes {
            index.insert(node);
        }
        index
    }

    pub fn insert(&mut self, node: &MemoryNode) {
        for emotion in &node.emotional_context {
            self.by_emotion
                .entry(*emotion)
                .or_default()
                .insert(node.id.clone());
        }
        for theme in &node.thematic_tags {
            self.by_theme
                .entry(theme.clone())
                .or_default()
                .insert(node.id.clone());
        }
        self.by_user
            .entry(node.user_id.clone())
            .or_default()
            .insert(node.id.clone());
        for trigger in &node.triggers {
            self.by_trigger
                .entry(trigger.clone())
                .or_default()
                .insert(node.id.clone());
        }
    }

    /// Purge a node's id from every index it was filed under
    pub fn remove(&mut self, node: &MemoryNode) {
        for emotion in &node.emotional_context {
            purge(&mut self.by_emotion, emotion, &node.id);
        }
        for theme in &node.thematic_tags {
            purge(&mut self.by_theme, theme, &node.id);
        }
        purge(&mut self.by_user, &node.user_id, &node.id);
        for trigger in &node.triggers {
            purge(&mut self.by_trigger, trigger, &node.id);
        }
    }

    pub fn by_emotion(&self, emotion: Emotion) -> Option<&HashSet<MemoryId>> {
        self.by_emotion.get(&emotion)
    }

    pub fn by_theme(&self, theme: &str) -> Option<&HashSet<MemoryId>> {
        self.by_theme.get(theme)
    }

    pub fn by_user(&self, user_id: &str) -> Option<&HashSet<MemoryId>> {
        self.by_user.get(user_id)
    }

    pub fn by_trigger(&self, trigger: &str) -> Option<&HashSet<MemoryId>> {
        self.by_trigger.get(trigger)
    }

    /// Ids filed under any of the given themes
    pub fn by_any_theme(&self, themes: &BTreeSet<String>) -> HashSet<MemoryId> {
        themes
            .iter()
            .filter_map(|t| self.by_theme.get(t))
            .flatten()
            .cloned()
            .collect()
    }

    /// Total number of (key, id) postings across all indexes
    pub fn postings(&self) -> usize {
        fn count<K>(map: &HashMap<K, HashSet<MemoryId>>) -> usize {
            map.values().map(HashSet::len).sum()
        }
        count(&self.by_emotion) + count(&self.by_theme) + count(&self.by_user) + count(&self.by_trigger)
    }
}

fn purge<K, Q>(map: &mut HashMap<K, HashSet<MemoryId>>, key: &Q, id: &str)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(ids) = map.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

/// Derive trigger keywords from serialized content
///
/// Keeps alphabetic tokens of at least `min_len` characters, lowercased,
/// in order of first appearance, up to `max` of them.
pub fn extract_triggers(content: &Content, max: usize, min_len: usize) -> BTreeSet<String> {
    let serialized = serde_json::Value::Object(content.clone()).to_string();
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for token in serialized
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.chars().count() >= min_len)
    {
        if ordered.len() >= max {
            break;
        }
        let token = token.to_lowercase();
        if seen.insert(token.clone()) {
            ordered.push(token);
        }
    }

    ordered.into_iter().collect()
}

/// Normalize caller-supplied triggers to the indexed form
pub fn normalize_triggers(triggers: BTreeSet<String>) -> BTreeSet<String> {
    triggers
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
