//! Memory events - broadcast notifications of store changes
//!
//! The store emits an event after every mutation, once its lock has been
//! released. Subscribers that fall behind lose the oldest events, the same
//! as any `tokio::sync::broadcast` receiver.
//!
//! ```rust,no_run
//! use chronicle::{LayeredMemory, MemoryEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let memory = LayeredMemory::new("campaign-1");
//!     let mut events = memory.events().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}", event.description());
//!         }
//!     });
//! }
//! ```

use crate::types::{MemoryId, MemoryLayer, MemoryType};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// A change to the memory store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MemoryEvent {
    /// A memory was added
    Created {
        memory_id: MemoryId,
        memory_type: MemoryType,
        layer: MemoryLayer,
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A short-term memory was pushed out of the ring buffer
    Evicted {
        memory_id: MemoryId,
        timestamp: DateTime<Utc>,
    },

    /// A memory was strengthened by recall
    Reinforced {
        memory_id: MemoryId,
        reinforcement_count: u64,
        decay_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// A memory was removed by the forgetting pass
    Forgotten {
        memory_id: MemoryId,
        significance: f64,
        timestamp: DateTime<Utc>,
    },

    /// A recall query was served
    Recalled {
        results_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The store was rebuilt from a snapshot
    Restored {
        campaign_id: String,
        memories: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MemoryEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MemoryEvent::Created { timestamp, .. } => *timestamp,
            MemoryEvent::Evicted { timestamp, .. } => *timestamp,
            MemoryEvent::Reinforced { timestamp, .. } => *timestamp,
            MemoryEvent::Forgotten { timestamp, .. } => *timestamp,
            MemoryEvent::Recalled { timestamp, .. } => *timestamp,
            MemoryEvent::Restored { timestamp, .. } => *timestamp,
        }
    }

    /// Get the memory ID if applicable
    pub fn memory_id(&self) -> Option<&str> {
        match self {
            MemoryEvent::Created { memory_id, .. } => Some(memory_id),
            MemoryEvent::Evicted { memory_id, .. } => Some(memory_id),
            MemoryEvent::Reinforced { memory_id, .. } => Some(memory_id),
            MemoryEvent::Forgotten { memory_id, .. } => Some(memory_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            MemoryEvent::Created { .. } => EventKind::Created,
            MemoryEvent::Evicted { .. } => EventKind::Evicted,
            MemoryEvent::Reinforced { .. } => EventKind::Reinforced,
            MemoryEvent::Forgotten { .. } => EventKind::Forgotten,
            MemoryEvent::Recalled { .. } => EventKind::Recalled,
            MemoryEvent::Restored { .. } => EventKind::Restored,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> String {
        match self {
            MemoryEvent::Created {
                memory_id,
                memory_type,
                layer,
                ..
            } => format!("New {} memory in {}: {}", memory_type, layer, memory_id),
            MemoryEvent::Evicted { memory_id, .. } => {
                format!("Memory {} evicted from short-term", memory_id)
            }
            MemoryEvent::Reinforced {
                memory_id,
                reinforcement_count,
                ..
            } => format!(
                "Memory {} reinforced (count: {})",
                memory_id, reinforcement_count
            ),
            MemoryEvent::Forgotten {
                memory_id,
                significance,
                ..
            } => format!(
                "Memory {} forgotten (significance: {:.3})",
                memory_id, significance
            ),
            MemoryEvent::Recalled { results_count, .. } => {
                format!("Recall returned {} memories", results_count)
            }
            MemoryEvent::Restored {
                campaign_id,
                memories,
                ..
            } => format!(
                "Campaign {} restored with {} memories",
                campaign_id, memories
            ),
        }
    }
}

/// Event kinds (for stats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Evicted,
    Reinforced,
    Forgotten,
    Recalled,
    Restored,
}

/// Emission counts
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    pub total_emitted: u64,
    pub last_emitted: Option<DateTime<Utc>>,
    pub by_kind: HashMap<EventKind, u64>,
}

/// Broadcast bus for memory events
#[derive(Debug, Clone)]
pub struct MemoryEvents {
    sender: broadcast::Sender<MemoryEvent>,
    stats: Arc<RwLock<EventStats>>,
}

impl MemoryEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            stats: Arc::new(RwLock::new(EventStats::default())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }

    /// Emit an event; having no subscribers is fine
    pub fn emit(&self, event: MemoryEvent) {
        {
            let mut stats = self.stats.write();
            stats.total_emitted += 1;
            stats.last_emitted = Some(event.timestamp());
            *stats.by_kind.entry(event.kind()).or_insert(0) += 1;
        }

        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = MemoryEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn stats(&self) -> EventStats {
        self.stats.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
