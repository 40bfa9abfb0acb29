//! Snapshot codec: the JSON-compatible persisted form of a store
//!
//! Indexes are never part of a snapshot. They are rebuilt from the nodes on
//! load, so they cannot drift from node state across a save/load cycle.

use crate::error::{MemoryError, Result};
use crate::profile::UserProfile;
use crate::types::{MemoryId, MemoryLayer, MemoryNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Running counters carried across save/load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounters {
    pub created: u64,
    pub forgotten: u64,
    pub reinforced: u64,
    #[serde(default)]
    pub evicted: u64,
}

/// Full persisted state of one campaign's memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub campaign_id: String,
    /// Short-term ring buffer, oldest first
    pub short_term: Vec<MemoryNode>,
    pub mid_term: BTreeMap<MemoryId, MemoryNode>,
    pub long_term: BTreeMap<MemoryId, MemoryNode>,
    pub user_profiles: BTreeMap<String, UserProfile>,
    /// Nodes removed by forgetting, in removal order
    pub forgotten: Vec<MemoryNode>,
    pub stats: SnapshotCounters,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl MemorySnapshot {
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot; malformed or missing fields are validation errors
    pub fn from_json_str(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| MemoryError::Validation(e.to_string()))
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| MemoryError::Validation(e.to_string()))
    }

    /// Number of live nodes across all tiers
    pub fn live_count(&self) -> usize {
        self.short_term.len() + self.mid_term.len() + self.long_term.len()
    }

    /// Check tier placement, id uniqueness and node invariants
    pub fn validate(&self, short_term_capacity: usize) -> Result<()> {
        if self.version > SNAPSHOT_VERSION {
            return Err(MemoryError::Validation(format!(
                "snapshot version {} is newer than supported version {}",
                self.version, SNAPSHOT_VERSION
            )));
        }
        if self.short_term.len() > short_term_capacity {
            return Err(MemoryError::Validation(format!(
                "short_term holds {} memories but capacity is {}",
                self.short_term.len(),
                short_term_capacity
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();

        for node in &self.short_term {
            check_node(node, MemoryLayer::ShortTerm, &mut seen)?;
        }
        for (layer, tier) in [
            (MemoryLayer::MidTerm, &self.mid_term),
            (MemoryLayer::LongTerm, &self.long_term),
        ] {
            for (key, node) in tier {
                if key != &node.id {
                    return Err(MemoryError::Validation(format!(
                        "{} key '{}' does not match node id '{}'",
                        layer, key, node.id
                    )));
                }
                check_node(node, layer, &mut seen)?;
            }
        }

        for node in &self.forgotten {
            node.check_invariants().map_err(MemoryError::Validation)?;
        }

        Ok(())
    }
}

fn check_node<'a>(
    node: &'a MemoryNode,
    expected: MemoryLayer,
    seen: &mut HashSet<&'a str>,
) -> Result<()> {
    if node.layer != expected {
        return Err(MemoryError::Validation(format!(
            "memory {} is tagged {} but stored in {}",
            node.id, node.layer, expected
        )));
    }
    node.check_invariants().map_err(MemoryError::Validation)?;
    if !seen.insert(node.id.as_str()) {
        return Err(MemoryError::Validation(format!(
            "memory id {} appears more than once",
            node.id
        )));
    }
    Ok(())
}
