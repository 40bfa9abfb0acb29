//! # Chronicle - Layered Narrative Memory for Interactive Stories
//!
//! Chronicle keeps the story beats of a campaign in three tiers: a bounded
//! short-term buffer, a mid-term map and a long-term map. Every memory is
//! scored by a time-decaying significance that recall reinforces, and weak
//! mid- and long-term memories can be forgotten.
//!
//! ```rust,no_run
//! use chronicle::{Emotion, LayeredMemory, MemoryLayer, MemoryType, NewMemory, RecallQuery};
//! use serde_json::json;
//!
//! fn main() -> chronicle::Result<()> {
//!     let memory = LayeredMemory::new("campaign-1");
//!
//!     let content = chronicle::content_from_value(json!({ "action": "spared the thief" }))?;
//!     memory.add_memory(
//!         NewMemory::new(content, MemoryType::Decision, MemoryLayer::MidTerm, "alice", "s1")
//!             .with_emotional_weight(0.8)
//!             .with_emotions([Emotion::Trust])
//!             .with_themes(["mercy"]),
//!     )?;
//!
//!     for hit in memory.recall(&RecallQuery::new().user("alice").limit(5)) {
//!         println!("{} {:.2}", hit.node.id, hit.significance);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod index;
pub mod maintenance;
pub mod profile;
pub mod recall;
pub mod significance;
pub mod snapshot;
pub mod store;
pub mod tiers;
pub mod types;

pub use config::{MemoryConfig, MemoryConfigBuilder};
pub use context::ContextWindow;
pub use error::{MemoryError, Result};
pub use events::{EventKind, EventStats, MemoryEvent, MemoryEvents};
pub use index::{extract_triggers, normalize_triggers, MemoryIndex};
pub use maintenance::{validate_threshold, ForgetReport};
pub use profile::{ProfileAggregator, UserProfile};
pub use recall::{RecallHit, RecallQuery};
pub use significance::{SignificanceScorer, MIN_DECAY_RATE, REINFORCE_DECAY_FACTOR};
pub use snapshot::{MemorySnapshot, SnapshotCounters, SNAPSHOT_VERSION};
pub use store::{LayeredMemory, MemoryStats};
pub use tiers::Tiers;
pub use types::{
    content_from_value, Content, Emotion, MemoryId, MemoryLayer, MemoryNode, MemoryType,
    NewMemory,
};
