//! Memory node types and tagged variants

use crate::error::{MemoryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for memories
pub type MemoryId = String;

/// Opaque structured payload carried by a memory
pub type Content = serde_json::Map<String, serde_json::Value>;

/// A single narrative memory record
///
/// Nodes are owned by the store. Callers only ever receive clones, so
/// mutating a returned node never affects stored state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryNode {
    /// Unique identifier
    pub id: MemoryId,
    /// The memory payload
    pub content: Content,
    /// Kind of narrative record
    pub memory_type: MemoryType,
    /// Tier this node lives in (fixed at creation)
    pub layer: MemoryLayer,
    /// When the memory was created
    pub timestamp: DateTime<Utc>,
    /// When the memory was last recalled
    pub last_accessed: DateTime<Utc>,
    /// Emotional weight (0.0 - 1.0)
    pub emotional_weight: f64,
    /// Emotions attached to the memory
    pub emotional_context: BTreeSet<Emotion>,
    /// Free-form narrative themes
    pub thematic_tags: BTreeSet<String>,
    /// Owning user
    pub user_id: String,
    /// Session the memory was recorded in
    pub session_id: String,
    /// Decay per hour, floored at 0.01
    pub decay_rate: f64,
    /// Number of times this memory was reinforced by recall
    pub reinforcement_count: u64,
    /// Ids of associated memories
    #[serde(default)]
    pub associations: BTreeSet<MemoryId>,
    /// Lowercase keywords used to match free-text recall
    pub triggers: BTreeSet<String>,
    /// Ids of memories that caused this one
    #[serde(default)]
    pub causal_links: BTreeSet<MemoryId>,
    /// Caller-supplied extras
    #[serde(default)]
    pub personalization: Content,
}

impl MemoryNode {
    /// Derive a deterministic id from content and creation metadata
    pub fn derive_id(
        content: &Content,
        layer: MemoryLayer,
        memory_type: MemoryType,
        timestamp: DateTime<Utc>,
    ) -> Result<MemoryId> {
        let serialized = serde_json::to_string(content)?;
        let name = format!(
            "{}|{}|{}|{}",
            serialized,
            layer,
            memory_type,
            timestamp.to_rfc3339()
        );
        Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }

    /// Content serialized the way trigger extraction and text queries see it
    pub fn serialized_content(&self) -> String {
        serde_json::Value::Object(self.content.clone()).to_string()
    }

    /// Check whether the node shares at least one theme with `themes`
    pub fn has_any_theme(&self, themes: &BTreeSet<String>) -> bool {
        themes.iter().any(|t| self.thematic_tags.contains(t))
    }

    /// Check the invariants every stored node must hold
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if !self.emotional_weight.is_finite() || !(0.0..=1.0).contains(&self.emotional_weight) {
            return Err(format!(
                "memory {} has emotional_weight {} outside [0, 1]",
                self.id, self.emotional_weight
            ));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < crate::significance::MIN_DECAY_RATE {
            return Err(format!(
                "memory {} has decay_rate {} below the floor",
                self.id, self.decay_rate
            ));
        }
        if self.id.is_empty() {
            return Err("memory with empty id".to_string());
        }
        Ok(())
    }
}

/// Kinds of narrative memories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Something that happened
    Event,
    /// A choice the player made
    Decision,
    /// An emotional beat
    Emotion,
    /// A change in a relationship
    Relationship,
    /// A recurring narrative theme
    Theme,
    /// A change to the state of the world
    WorldState,
    /// Something the story should refer back to
    Callback,
    /// A hint about something to come
    Foreshadow,
}

impl MemoryType {
    /// All memory types
    pub const ALL: &[MemoryType] = &[
        MemoryType::Event,
        MemoryType::Decision,
        MemoryType::Emotion,
        MemoryType::Relationship,
        MemoryType::Theme,
        MemoryType::WorldState,
        MemoryType::Callback,
        MemoryType::Foreshadow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Event => "event",
            MemoryType::Decision => "decision",
            MemoryType::Emotion => "emotion",
            MemoryType::Relationship => "relationship",
            MemoryType::Theme => "theme",
            MemoryType::WorldState => "world_state",
            MemoryType::Callback => "callback",
            MemoryType::Foreshadow => "foreshadow",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize_tag(s);
        MemoryType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown memory type '{}'", s)))
    }
}

/// Memory tiers, each with its own capacity and eviction policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLayer {
    /// Bounded ring buffer, FIFO eviction
    ShortTerm,
    /// Unbounded, subject to forgetting
    MidTerm,
    /// Unbounded, subject to forgetting
    LongTerm,
}

impl MemoryLayer {
    /// All layers
    pub const ALL: &[MemoryLayer] = &[
        MemoryLayer::ShortTerm,
        MemoryLayer::MidTerm,
        MemoryLayer::LongTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLayer::ShortTerm => "short_term",
            MemoryLayer::MidTerm => "mid_term",
            MemoryLayer::LongTerm => "long_term",
        }
    }

    /// Significance multiplier applied to nodes in this layer
    pub fn multiplier(&self) -> f64 {
        match self {
            MemoryLayer::ShortTerm => 0.5,
            MemoryLayer::MidTerm => 1.0,
            MemoryLayer::LongTerm => 1.5,
        }
    }

    /// Whether the forgetting pass may remove nodes from this layer
    pub fn can_forget(&self) -> bool {
        !matches!(self, MemoryLayer::ShortTerm)
    }
}

impl std::fmt::Display for MemoryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryLayer {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize_tag(s);
        MemoryLayer::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == normalized)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown memory layer '{}'", s)))
    }
}

/// Emotion tags attached to memories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Sadness,
    Fear,
    Anger,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
    Curiosity,
    Determination,
}

impl Emotion {
    pub const ALL: &[Emotion] = &[
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Fear,
        Emotion::Anger,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Trust,
        Emotion::Anticipation,
        Emotion::Curiosity,
        Emotion::Determination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Fear => "fear",
            Emotion::Anger => "anger",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
            Emotion::Curiosity => "curiosity",
            Emotion::Determination => "determination",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = normalize_tag(s);
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == normalized)
            .ok_or_else(|| MemoryError::InvalidArgument(format!("unknown emotion '{}'", s)))
    }
}

fn normalize_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(['-', ' '], "_")
}

/// Input for creating a memory
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub content: Content,
    pub memory_type: MemoryType,
    pub layer: MemoryLayer,
    pub user_id: String,
    pub session_id: String,
    pub emotional_weight: f64,
    pub emotional_context: BTreeSet<Emotion>,
    pub thematic_tags: BTreeSet<String>,
    /// Derived from content when not supplied
    pub triggers: Option<BTreeSet<String>>,
    pub personalization: Content,
    pub associations: BTreeSet<MemoryId>,
    pub causal_links: BTreeSet<MemoryId>,
    /// Derived from content and metadata when not supplied
    pub id: Option<MemoryId>,
    /// Defaults to the time of insertion
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMemory {
    pub fn new(
        content: Content,
        memory_type: MemoryType,
        layer: MemoryLayer,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            content,
            memory_type,
            layer,
            user_id: user_id.into(),
            session_id: session_id.into(),
            emotional_weight: 0.5,
            emotional_context: BTreeSet::new(),
            thematic_tags: BTreeSet::new(),
            triggers: None,
            personalization: Content::new(),
            associations: BTreeSet::new(),
            causal_links: BTreeSet::new(),
            id: None,
            timestamp: None,
        }
    }

    /// Build from loosely-typed tag strings, rejecting unknown tags
    pub fn from_tags(
        content: Content,
        memory_type: &str,
        layer: &str,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Result<Self> {
        let memory_type = memory_type.parse()?;
        let layer = layer.parse()?;
        Ok(Self::new(content, memory_type, layer, user_id, session_id))
    }

    pub fn with_emotional_weight(mut self, weight: f64) -> Self {
        self.emotional_weight = weight;
        self
    }

    pub fn with_emotions(mut self, emotions: impl IntoIterator<Item = Emotion>) -> Self {
        self.emotional_context.extend(emotions);
        self
    }

    pub fn with_themes<S: Into<String>>(mut self, themes: impl IntoIterator<Item = S>) -> Self {
        self.thematic_tags.extend(themes.into_iter().map(Into::into));
        self
    }

    pub fn with_triggers<S: Into<String>>(mut self, triggers: impl IntoIterator<Item = S>) -> Self {
        self.triggers = Some(triggers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_personalization(mut self, personalization: Content) -> Self {
        self.personalization = personalization;
        self
    }

    pub fn with_associations<S: Into<MemoryId>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.associations.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_causal_links<S: Into<MemoryId>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.causal_links.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_id(mut self, id: impl Into<MemoryId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Reject inputs that would violate node invariants
    pub fn validate(&self) -> Result<()> {
        if !self.emotional_weight.is_finite() || !(0.0..=1.0).contains(&self.emotional_weight) {
            return Err(MemoryError::InvalidArgument(format!(
                "emotional_weight must be within [0, 1], got {}",
                self.emotional_weight
            )));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(MemoryError::InvalidArgument("id must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Build a `Content` map from a JSON object value
pub fn content_from_value(value: serde_json::Value) -> Result<Content> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(MemoryError::InvalidArgument(format!(
            "memory content must be a JSON object, got {}",
            other
        ))),
    }
}
