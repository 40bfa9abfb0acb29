//! Layered memory store
//!
//! One `LayeredMemory` exists per campaign. All state sits behind a single
//! lock: writers (`add_memory`, `forget`, `restore`) take it exclusively,
//! lookups share it, and `recall` scans under an upgradable read that is
//! upgraded only to reinforce the winners.

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::events::{MemoryEvent, MemoryEvents};
use crate::index::{extract_triggers, normalize_triggers, MemoryIndex};
use crate::maintenance::{self, ForgetReport};
use crate::profile::{ProfileAggregator, UserProfile};
use crate::recall::{self, RecallHit, RecallQuery};
use crate::significance::MIN_DECAY_RATE;
use crate::snapshot::{MemorySnapshot, SnapshotCounters, SNAPSHOT_VERSION};
use crate::tiers::Tiers;
use crate::types::{MemoryId, MemoryLayer, MemoryNode, NewMemory};

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Counters and tier sizes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Memories ever added
    pub created: u64,
    /// Memories removed by forgetting
    pub forgotten: u64,
    /// Reinforcements applied by recall
    pub reinforced: u64,
    /// Short-term memories pushed out of the ring buffer
    pub evicted: u64,
    pub short_term: usize,
    pub mid_term: usize,
    pub long_term: usize,
    /// Users with a profile
    pub users: usize,
}

impl MemoryStats {
    pub fn total(&self) -> usize {
        self.short_term + self.mid_term + self.long_term
    }
}

struct MemoryState {
    tiers: Tiers,
    index: MemoryIndex,
    profiles: ProfileAggregator,
    forgotten: Vec<MemoryNode>,
    /// Ids in the forgotten log, never handed out again
    forgotten_ids: HashSet<MemoryId>,
    counters: SnapshotCounters,
}

impl MemoryState {
    fn empty(short_term_capacity: usize) -> Self {
        Self {
            tiers: Tiers::new(short_term_capacity),
            index: MemoryIndex::new(),
            profiles: ProfileAggregator::new(),
            forgotten: Vec::new(),
            forgotten_ids: HashSet::new(),
            counters: SnapshotCounters::default(),
        }
    }

    fn from_snapshot(snapshot: MemorySnapshot, short_term_capacity: usize) -> Self {
        let mut tiers = Tiers::new(short_term_capacity);
        for node in snapshot
            .short_term
            .into_iter()
            .chain(snapshot.mid_term.into_values())
            .chain(snapshot.long_term.into_values())
        {
            tiers.insert(node);
        }
        let index = MemoryIndex::rebuild(tiers.iter());
        let forgotten_ids = snapshot.forgotten.iter().map(|n| n.id.clone()).collect();

        Self {
            tiers,
            index,
            profiles: ProfileAggregator::from_profiles(snapshot.user_profiles),
            forgotten: snapshot.forgotten,
            forgotten_ids,
            counters: snapshot.stats,
        }
    }

    fn id_taken(&self, id: &str) -> bool {
        self.tiers.contains(id) || self.forgotten_ids.contains(id)
    }

    /// First id derived from `base` that names neither a live node nor an
    /// entry of the forgotten log
    fn unique_id(&self, base: MemoryId) -> MemoryId {
        if !self.id_taken(&base) {
            return base;
        }
        let mut nonce = 1u64;
        loop {
            let candidate = format!("{}-{}", base, nonce);
            if !self.id_taken(&candidate) {
                return candidate;
            }
            nonce += 1;
        }
    }

    fn reinforce(&mut self, ids: &[(MemoryId, f64)], now: DateTime<Utc>) -> Vec<MemoryEvent> {
        let mut events = Vec::with_capacity(ids.len());
        for (id, _) in ids {
            if let Some(node) = self.tiers.get_mut(id) {
                node.reinforce(now);
                self.counters.reinforced += 1;
                tracing::debug!(
                    "Reinforced memory {} (count {}, decay {:.4})",
                    id,
                    node.reinforcement_count,
                    node.decay_rate
                );
                events.push(MemoryEvent::Reinforced {
                    memory_id: id.clone(),
                    reinforcement_count: node.reinforcement_count,
                    decay_rate: node.decay_rate,
                    timestamp: now,
                });
            }
        }
        events
    }

    fn hits(&self, ranked: Vec<(MemoryId, f64)>) -> Vec<RecallHit> {
        ranked
            .into_iter()
            .filter_map(|(id, significance)| self.tiers.get(&id).cloned().map(|n| (n, significance)))
            .enumerate()
            .map(|(i, (node, significance))| RecallHit {
                node,
                significance,
                rank: i + 1,
            })
            .collect()
    }
}

/// Three-tier narrative memory for one campaign
pub struct LayeredMemory {
    campaign_id: String,
    config: MemoryConfig,
    state: RwLock<MemoryState>,
    events: MemoryEvents,
}

impl std::fmt::Debug for LayeredMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LayeredMemory")
            .field("campaign_id", &self.campaign_id)
            .field("short_term", &state.tiers.len(MemoryLayer::ShortTerm))
            .field("mid_term", &state.tiers.len(MemoryLayer::MidTerm))
            .field("long_term", &state.tiers.len(MemoryLayer::LongTerm))
            .finish()
    }
}

impl LayeredMemory {
    /// Create an empty store with the default configuration
    pub fn new(campaign_id: impl Into<String>) -> Self {
        let config = MemoryConfig::default();
        Self {
            campaign_id: campaign_id.into(),
            state: RwLock::new(MemoryState::empty(config.short_term_capacity)),
            events: MemoryEvents::new(config.event_capacity),
            config,
        }
    }

    /// Create an empty store with a custom configuration
    pub fn with_config(campaign_id: impl Into<String>, config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            campaign_id: campaign_id.into(),
            state: RwLock::new(MemoryState::empty(config.short_term_capacity)),
            events: MemoryEvents::new(config.event_capacity),
            config,
        })
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Event bus for subscribing to store changes
    pub fn events(&self) -> &MemoryEvents {
        &self.events
    }

    // ─── Insertion ────────────────────────────────────────────────────────

    /// Add a memory, returning its id
    ///
    /// Invalid input is rejected before the lock is taken, so a failed call
    /// leaves tiers, indexes and profiles untouched.
    pub fn add_memory(&self, input: NewMemory) -> Result<MemoryId> {
        input.validate()?;

        let now = Utc::now();
        let timestamp = input.timestamp.unwrap_or(now);

        let triggers = match input.triggers {
            Some(triggers) => normalize_triggers(triggers),
            None => extract_triggers(
                &input.content,
                self.config.max_triggers,
                self.config.min_trigger_len,
            ),
        };

        let decay_rate = (self.config.base_decay(input.layer)
            * (1.0 - input.emotional_weight * 0.5))
            .max(MIN_DECAY_RATE);

        let base_id = match input.id {
            Some(id) => id,
            None => MemoryNode::derive_id(&input.content, input.layer, input.memory_type, timestamp)?,
        };

        let mut events = Vec::with_capacity(2);
        let id = {
            let mut state = self.state.write();
            let id = state.unique_id(base_id);

            let node = MemoryNode {
                id: id.clone(),
                content: input.content,
                memory_type: input.memory_type,
                layer: input.layer,
                timestamp,
                last_accessed: timestamp,
                emotional_weight: input.emotional_weight,
                emotional_context: input.emotional_context,
                thematic_tags: input.thematic_tags,
                user_id: input.user_id,
                session_id: input.session_id,
                decay_rate,
                reinforcement_count: 0,
                associations: input.associations,
                triggers,
                causal_links: input.causal_links,
                personalization: input.personalization,
            };

            state.index.insert(&node);
            state.profiles.record(&node);
            events.push(MemoryEvent::Created {
                memory_id: id.clone(),
                memory_type: node.memory_type,
                layer: node.layer,
                user_id: node.user_id.clone(),
                timestamp: now,
            });
            tracing::debug!("Added {} memory {} to {}", node.memory_type, id, node.layer);

            if let Some(evicted) = state.tiers.insert(node) {
                state.index.remove(&evicted);
                state.counters.evicted += 1;
                tracing::debug!("Evicted short-term memory {}", evicted.id);
                events.push(MemoryEvent::Evicted {
                    memory_id: evicted.id,
                    timestamp: now,
                });
            }
            state.counters.created += 1;
            id
        };

        self.events.emit_all(events);
        Ok(id)
    }

    // ─── Lookup ───────────────────────────────────────────────────────────

    /// Look a memory up across all tiers
    pub fn get(&self, id: &str) -> Option<MemoryNode> {
        self.state.read().tiers.get(id).cloned()
    }

    /// Live memories referenced by a memory's associations and causal links
    pub fn linked(&self, id: &str) -> Result<Vec<MemoryNode>> {
        let state = self.state.read();
        let node = state
            .tiers
            .get(id)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;

        let targets: BTreeSet<&MemoryId> = node
            .associations
            .iter()
            .chain(node.causal_links.iter())
            .collect();

        Ok(targets
            .into_iter()
            .filter_map(|target| state.tiers.get(target).cloned())
            .collect())
    }

    /// Live memories filed under a trigger keyword, best-scoring first
    ///
    /// Exact keyword lookup through the trigger index. Free-text recall
    /// matches substrings and so cannot be served from this index.
    pub fn find_by_trigger(&self, keyword: &str) -> Vec<MemoryNode> {
        let keyword = keyword.trim().to_lowercase();
        let now = Utc::now();
        let state = self.state.read();
        let Some(ids) = state.index.by_trigger(&keyword) else {
            return Vec::new();
        };

        let mut nodes: Vec<(MemoryNode, f64)> = ids
            .iter()
            .filter_map(|id| state.tiers.get(id))
            .map(|node| (node.clone(), node.significance(now)))
            .collect();
        nodes.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        nodes.into_iter().map(|(node, _)| node).collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().tiers.total()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().tiers.is_empty()
    }

    // ─── Recall ───────────────────────────────────────────────────────────

    /// Ranked, filtered recall that reinforces the top results
    pub fn recall(&self, query: &RecallQuery) -> Vec<RecallHit> {
        self.recall_at(query, Utc::now())
    }

    /// Recall against an explicit clock value
    pub fn recall_at(&self, query: &RecallQuery, now: DateTime<Utc>) -> Vec<RecallHit> {
        let (hits, mut events) = {
            let state = self.state.upgradable_read();
            let ranked = recall::rank(&state.tiers, &state.index, query, now);
            let top = self.config.recall_reinforce_top.min(ranked.len());

            if top == 0 {
                let hits = state.hits(ranked);
                (hits, Vec::new())
            } else {
                let mut state = RwLockUpgradableReadGuard::upgrade(state);
                let events = state.reinforce(&ranked[..top], now);
                let hits = state.hits(ranked);
                (hits, events)
            }
        };

        events.push(MemoryEvent::Recalled {
            results_count: hits.len(),
            timestamp: now,
        });
        self.events.emit_all(events);
        hits
    }

    // ─── Forgetting ───────────────────────────────────────────────────────

    /// Remove mid- and long-term memories scoring below `threshold`
    ///
    /// Thresholds outside [0, 1] are rejected. Holds the write lock for the
    /// whole scan.
    pub fn forget(&self, threshold: f64) -> Result<ForgetReport> {
        self.forget_at(threshold, Utc::now())
    }

    /// Forget with the configured default threshold
    pub fn forget_default(&self) -> Result<ForgetReport> {
        self.forget(self.config.default_forget_threshold)
    }

    pub fn forget_at(&self, threshold: f64, now: DateTime<Utc>) -> Result<ForgetReport> {
        maintenance::validate_threshold(threshold)?;

        let mut events = Vec::new();
        let report = {
            let mut state = self.state.write();
            let state = &mut *state;
            let (checked, removed) =
                maintenance::forget_below(&mut state.tiers, &mut state.index, threshold, now);

            let mut forgotten = Vec::with_capacity(removed.len());
            for (node, significance) in removed {
                events.push(MemoryEvent::Forgotten {
                    memory_id: node.id.clone(),
                    significance,
                    timestamp: now,
                });
                forgotten.push(node.id.clone());
                state.forgotten_ids.insert(node.id.clone());
                state.forgotten.push(node);
                state.counters.forgotten += 1;
            }

            ForgetReport {
                threshold,
                checked,
                forgotten,
            }
        };

        tracing::info!(
            "Forgetting pass checked {} memories, forgot {} (threshold {})",
            report.checked,
            report.forgotten_count(),
            threshold
        );
        self.events.emit_all(events);
        Ok(report)
    }

    /// Nodes removed by forgetting, in removal order
    pub fn forgotten_log(&self) -> Vec<MemoryNode> {
        self.state.read().forgotten.clone()
    }

    // ─── Profiles & Stats ─────────────────────────────────────────────────

    pub fn get_user_profile(&self, user_id: &str) -> Option<UserProfile> {
        self.state.read().profiles.get(user_id).cloned()
    }

    pub fn stats_summary(&self) -> MemoryStats {
        let state = self.state.read();
        MemoryStats {
            created: state.counters.created,
            forgotten: state.counters.forgotten,
            reinforced: state.counters.reinforced,
            evicted: state.counters.evicted,
            short_term: state.tiers.len(MemoryLayer::ShortTerm),
            mid_term: state.tiers.len(MemoryLayer::MidTerm),
            long_term: state.tiers.len(MemoryLayer::LongTerm),
            users: state.profiles.len(),
        }
    }

    // ─── Snapshots ────────────────────────────────────────────────────────

    /// Capture the full store state
    pub fn to_snapshot(&self) -> MemorySnapshot {
        let state = self.state.read();
        MemorySnapshot {
            version: SNAPSHOT_VERSION,
            campaign_id: self.campaign_id.clone(),
            short_term: state.tiers.layer(MemoryLayer::ShortTerm).cloned().collect(),
            mid_term: state
                .tiers
                .layer(MemoryLayer::MidTerm)
                .map(|n| (n.id.clone(), n.clone()))
                .collect(),
            long_term: state
                .tiers
                .layer(MemoryLayer::LongTerm)
                .map(|n| (n.id.clone(), n.clone()))
                .collect(),
            user_profiles: state.profiles.to_map(),
            forgotten: state.forgotten.clone(),
            stats: state.counters,
        }
    }

    /// Build a store from a snapshot, rebuilding every index
    pub fn from_snapshot(snapshot: MemorySnapshot, config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        snapshot.validate(config.short_term_capacity)?;

        let campaign_id = snapshot.campaign_id.clone();
        let live = snapshot.live_count();
        let state = MemoryState::from_snapshot(snapshot, config.short_term_capacity);
        tracing::info!("Loaded campaign {} with {} memories", campaign_id, live);

        Ok(Self {
            campaign_id,
            state: RwLock::new(state),
            events: MemoryEvents::new(config.event_capacity),
            config,
        })
    }

    /// Replace this store's state with a snapshot of the same campaign
    pub fn restore(&self, snapshot: MemorySnapshot) -> Result<()> {
        if snapshot.campaign_id != self.campaign_id {
            return Err(MemoryError::Validation(format!(
                "snapshot belongs to campaign '{}', not '{}'",
                snapshot.campaign_id, self.campaign_id
            )));
        }
        snapshot.validate(self.config.short_term_capacity)?;

        let live = snapshot.live_count();
        let restored = MemoryState::from_snapshot(snapshot, self.config.short_term_capacity);
        *self.state.write() = restored;

        tracing::info!("Restored campaign {} with {} memories", self.campaign_id, live);
        self.events.emit(MemoryEvent::Restored {
            campaign_id: self.campaign_id.clone(),
            memories: live,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigBuilder;
    use crate::types::{content_from_value, Content, Emotion, MemoryType};
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn content(value: serde_json::Value) -> Content {
        content_from_value(value).unwrap()
    }

    fn memory(text: &str, layer: MemoryLayer, user: &str) -> NewMemory {
        NewMemory::new(content(json!({ "action": text })), MemoryType::Event, layer, user, "s1")
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_add_memory_sets_initial_state() {
        let store = LayeredMemory::new("c1");
        let id = store
            .add_memory(
                memory("The ranger lit the signal fire", MemoryLayer::MidTerm, "alice")
                    .with_emotional_weight(0.8)
                    .with_emotions([Emotion::Determination])
                    .with_themes(["duty"]),
            )
            .unwrap();

        let node = store.get(&id).unwrap();
        assert!(approx(node.decay_rate, 0.1 * 0.6));
        assert_eq!(node.reinforcement_count, 0);
        assert_eq!(node.timestamp, node.last_accessed);
        assert!(node.triggers.contains("ranger"));
        assert!(node.triggers.contains("signal"));
        assert!(!node.triggers.contains("the"));
        assert_eq!(store.stats_summary().created, 1);
    }

    #[test]
    fn test_supplied_triggers_are_normalized_not_derived() {
        let store = LayeredMemory::new("c1");
        let id = store
            .add_memory(memory("The ranger lit the fire", MemoryLayer::MidTerm, "alice").with_triggers(["Beacon"]))
            .unwrap();
        let node = store.get(&id).unwrap();
        assert_eq!(node.triggers.len(), 1);
        assert!(node.triggers.contains("beacon"));
    }

    #[test]
    fn test_long_term_decay_rate_floor() {
        let store = LayeredMemory::new("c1");
        let id = store
            .add_memory(memory("oath sworn", MemoryLayer::LongTerm, "alice").with_emotional_weight(1.0))
            .unwrap();
        assert!(approx(store.get(&id).unwrap().decay_rate, 0.01));
    }

    #[test]
    fn test_invalid_input_leaves_store_unchanged() {
        let store = LayeredMemory::new("c1");

        assert!(NewMemory::from_tags(content(json!({"a": "b"})), "prophecy", "mid_term", "alice", "s1").is_err());
        let err = store
            .add_memory(memory("x", MemoryLayer::MidTerm, "alice").with_emotional_weight(-0.2))
            .unwrap_err();
        assert!(matches!(err, MemoryError::InvalidArgument(_)));

        assert!(store.is_empty());
        assert_eq!(store.stats_summary().created, 0);
        assert!(store.get_user_profile("alice").is_none());
        assert_eq!(store.state.read().index.postings(), 0);
    }

    #[test]
    fn test_short_term_is_bounded_ring_buffer() {
        let store = LayeredMemory::new("c1");
        let mut ids = Vec::new();
        for i in 0..60 {
            let input = NewMemory::new(
                content(json!({ "beat": i })),
                MemoryType::Event,
                MemoryLayer::ShortTerm,
                "alice",
                "s1",
            );
            ids.push(store.add_memory(input).unwrap());
        }

        let stats = store.stats_summary();
        assert_eq!(stats.short_term, 50);
        assert_eq!(stats.evicted, 10);
        assert_eq!(stats.created, 60);
        assert!(store.get(&ids[0]).is_none());
        assert!(store.get(&ids[59]).is_some());

        let snapshot = store.to_snapshot();
        assert!(snapshot.short_term.iter().all(|n| n.content["beat"] != json!(0)));
        assert_eq!(snapshot.short_term[0].content["beat"], json!(10));

        let indexed = store.state.read().index.by_user("alice").unwrap().len();
        assert_eq!(indexed, 50);
    }

    #[test]
    fn test_identical_memories_get_distinct_ids() {
        let store = LayeredMemory::new("c1");
        let ts = Utc::now();
        let a = store
            .add_memory(memory("a wolf howls", MemoryLayer::MidTerm, "alice").with_timestamp(ts))
            .unwrap();
        let b = store
            .add_memory(memory("a wolf howls", MemoryLayer::MidTerm, "alice").with_timestamp(ts))
            .unwrap();
        let c = store
            .add_memory(memory("a wolf howls", MemoryLayer::MidTerm, "alice").with_timestamp(ts))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(b, format!("{}-1", a));
        assert_eq!(c, format!("{}-2", a));
        assert_eq!(store.stats_summary().mid_term, 3);
    }

    #[test]
    fn test_forgotten_ids_are_not_reused() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();
        let old = now - Duration::days(20);

        let first = store
            .add_memory(memory("the old mill burned", MemoryLayer::MidTerm, "alice").with_timestamp(old))
            .unwrap();
        store.forget_at(0.1, now).unwrap();
        assert!(store.get(&first).is_none());

        let second = store
            .add_memory(memory("the old mill burned", MemoryLayer::MidTerm, "alice").with_timestamp(old))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(second, format!("{}-1", first));
        assert!(store.forgotten_log().iter().all(|n| store.get(&n.id).is_none()));

        let restored = LayeredMemory::from_snapshot(store.to_snapshot(), MemoryConfig::default()).unwrap();
        restored.forget_at(0.1, now).unwrap();
        let third = restored
            .add_memory(memory("the old mill burned", MemoryLayer::MidTerm, "alice").with_timestamp(old))
            .unwrap();
        assert_eq!(third, format!("{}-2", first));
    }

    #[test]
    fn test_find_by_trigger_uses_exact_keywords() {
        let store = LayeredMemory::new("c1");
        let tavern = store
            .add_memory(memory("met the smuggler", MemoryLayer::MidTerm, "alice").with_triggers(["Tavern"]))
            .unwrap();
        let strong = store
            .add_memory(
                memory("brawl broke out", MemoryLayer::LongTerm, "bob")
                    .with_triggers(["tavern", "brawl"])
                    .with_emotional_weight(0.9),
            )
            .unwrap();
        store
            .add_memory(memory("a quiet road", MemoryLayer::MidTerm, "alice").with_triggers(["road"]))
            .unwrap();

        let found: Vec<_> = store.find_by_trigger(" TAVERN ").into_iter().map(|n| n.id).collect();
        assert_eq!(found, vec![strong, tavern]);
        assert!(store.find_by_trigger("tave").is_empty());
        assert!(store.find_by_trigger("castle").is_empty());
    }

    #[test]
    fn test_selective_forgetting() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();

        let weak = store
            .add_memory(
                memory("a forgotten toll", MemoryLayer::MidTerm, "alice")
                    .with_emotional_weight(0.5)
                    .with_timestamp(now - Duration::days(10)),
            )
            .unwrap();
        let fading = store
            .add_memory(
                memory("a passing merchant", MemoryLayer::MidTerm, "alice")
                    .with_emotional_weight(0.0)
                    .with_timestamp(now - Duration::hours(8)),
            )
            .unwrap();
        let fresh = store
            .add_memory(
                memory("the king's decree", MemoryLayer::MidTerm, "alice")
                    .with_emotional_weight(0.1)
                    .with_timestamp(now),
            )
            .unwrap();
        let short = store
            .add_memory(
                memory("a stray thought", MemoryLayer::ShortTerm, "alice")
                    .with_emotional_weight(0.0)
                    .with_timestamp(now - Duration::days(10)),
            )
            .unwrap();

        assert!(approx(store.get(&weak).unwrap().significance(now), 0.05));
        assert!(approx(store.get(&fading).unwrap().significance(now), 0.2));
        assert!(approx(store.get(&fresh).unwrap().significance(now), 0.4));
        assert!(store.get(&short).unwrap().significance(now) < 0.1);

        let before_fading = store.get(&fading).unwrap();
        let report = store.forget_at(0.1, now).unwrap();

        assert_eq!(report.forgotten, vec![weak.clone()]);
        assert_eq!(report.checked, 3);
        assert!(store.get(&weak).is_none());
        assert_eq!(store.get(&fading).unwrap(), before_fading);
        assert!(store.get(&fresh).is_some());
        assert!(store.get(&short).is_some());

        let stats = store.stats_summary();
        assert_eq!(stats.forgotten, 1);
        assert_eq!(store.forgotten_log()[0].id, weak);
    }

    #[test]
    fn test_forget_rejects_out_of_range_threshold() {
        let store = LayeredMemory::new("c1");
        store
            .add_memory(memory("x", MemoryLayer::MidTerm, "alice").with_timestamp(Utc::now() - Duration::days(30)))
            .unwrap();

        assert!(matches!(store.forget(1.2), Err(MemoryError::InvalidArgument(_))));
        assert!(store.forget(-0.5).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats_summary().forgotten, 0);
    }

    #[test]
    fn test_forget_purges_indexes_and_keeps_profiles() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();
        store
            .add_memory(
                memory("the bridge collapsed", MemoryLayer::MidTerm, "alice")
                    .with_emotions([Emotion::Fear])
                    .with_themes(["loss"])
                    .with_timestamp(now - Duration::days(20)),
            )
            .unwrap();

        store.forget_at(0.5, now).unwrap();

        let hits = store.recall_at(&RecallQuery::new().emotion(Emotion::Fear), now);
        assert!(hits.is_empty());
        assert_eq!(store.state.read().index.postings(), 0);

        let profile = store.get_user_profile("alice").unwrap();
        assert_eq!(profile.emotions[&Emotion::Fear], 1);
        assert_eq!(profile.themes["loss"], 1);
    }

    #[test]
    fn test_ranking_scenario() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();
        let created = now - Duration::hours(8);

        let mut ids = Vec::new();
        for (text, weight) in [("strong", 0.9), ("medium", 0.5), ("faint", 0.1)] {
            ids.push(
                store
                    .add_memory(
                        memory(text, MemoryLayer::MidTerm, "alice")
                            .with_emotional_weight(weight)
                            .with_timestamp(created),
                    )
                    .unwrap(),
            );
        }

        let hits = store.recall_at(&RecallQuery::new().min_significance(0.3), now);
        let hit_ids: Vec<&str> = hits.iter().map(|h| h.node.id.as_str()).collect();
        assert_eq!(hit_ids, vec![ids[0].as_str(), ids[1].as_str()]);
        assert!(hits[0].significance > hits[1].significance);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn test_recall_reinforces_top_results_once_per_call() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();
        for i in 0..8 {
            store
                .add_memory(
                    memory(&format!("clue {}", i), MemoryLayer::MidTerm, "alice")
                        .with_emotional_weight(0.1 * (i as f64 + 1.0))
                        .with_timestamp(now - Duration::hours(1)),
                )
                .unwrap();
        }

        let query = RecallQuery::new().text("clue");
        let first = store.recall_at(&query, now);
        let second = store.recall_at(&query, now + Duration::seconds(1));
        assert_eq!(first.len(), 8);

        let top_first: BTreeSet<_> = first.iter().take(5).map(|h| h.node.id.clone()).collect();
        let top_second: BTreeSet<_> = second.iter().take(5).map(|h| h.node.id.clone()).collect();
        assert_eq!(top_first, top_second);

        for hit in &first {
            let stored = store.get(&hit.node.id).unwrap();
            if top_first.contains(&hit.node.id) {
                assert_eq!(hit.node.reinforcement_count, 1);
                assert_eq!(stored.reinforcement_count, 2);
            } else {
                assert_eq!(stored.reinforcement_count, 0);
            }
        }
        assert_eq!(store.stats_summary().reinforced, 10);
    }

    #[test]
    fn test_recall_is_user_isolated() {
        let store = LayeredMemory::new("c1");
        for user in ["alice", "bob", "alice", "carol", "bob"] {
            store
                .add_memory(memory(&format!("{} enters the keep", user), MemoryLayer::MidTerm, user))
                .unwrap();
        }
        store
            .add_memory(memory("alice mutters", MemoryLayer::ShortTerm, "alice"))
            .unwrap();

        let hits = store.recall(&RecallQuery::new().user("alice"));
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.node.user_id == "alice"));

        let none = store.recall(&RecallQuery::new().user("dave"));
        assert!(none.is_empty());
    }

    #[test]
    fn test_recall_with_no_filters_returns_everything() {
        let store = LayeredMemory::new("c1");
        for layer in [MemoryLayer::ShortTerm, MemoryLayer::MidTerm, MemoryLayer::LongTerm] {
            store.add_memory(memory("a bell tolls", layer, "alice")).unwrap();
        }
        let hits = store.recall(&RecallQuery::new());
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].node.layer, MemoryLayer::LongTerm);
        assert_eq!(hits[2].node.layer, MemoryLayer::ShortTerm);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = LayeredMemory::new("c1");
        let now = Utc::now();
        for i in 0..6 {
            let layer = MemoryLayer::ALL[i % 3];
            store
                .add_memory(
                    memory(&format!("chapter {} begins", i), layer, if i % 2 == 0 { "alice" } else { "bob" })
                        .with_emotional_weight(0.15 * i as f64)
                        .with_emotions([Emotion::ALL[i]])
                        .with_themes([format!("arc{}", i % 2)])
                        .with_timestamp(now - Duration::hours(i as i64 * 30)),
                )
                .unwrap();
        }
        store.recall_at(&RecallQuery::new().text("chapter"), now);
        store.forget_at(0.1, now).unwrap();

        let text = store.to_snapshot().to_json_string().unwrap();
        let restored =
            LayeredMemory::from_snapshot(MemorySnapshot::from_json_str(&text).unwrap(), MemoryConfig::default())
                .unwrap();

        assert_eq!(restored.campaign_id(), "c1");
        assert_eq!(restored.stats_summary(), store.stats_summary());
        assert_eq!(restored.get_user_profile("alice"), store.get_user_profile("alice"));
        assert_eq!(restored.forgotten_log(), store.forgotten_log());

        let later = now + Duration::hours(3);
        let original = store.to_snapshot();
        for node in original
            .short_term
            .iter()
            .chain(original.mid_term.values())
            .chain(original.long_term.values())
        {
            let twin = restored.get(&node.id).unwrap();
            assert_eq!(twin.timestamp, node.timestamp);
            assert_eq!(twin.last_accessed, node.last_accessed);
            assert_eq!(twin.decay_rate, node.decay_rate);
            assert_eq!(twin.reinforcement_count, node.reinforcement_count);
            assert!(approx(twin.significance(later), node.significance(later)));
        }

        let a = store.state.read().index.postings();
        let b = restored.state.read().index.postings();
        assert_eq!(a, b);
    }

    #[test]
    fn test_restore_rejects_other_campaign() {
        let store = LayeredMemory::new("c1");
        let other = LayeredMemory::new("c2");
        other.add_memory(memory("elsewhere", MemoryLayer::MidTerm, "alice")).unwrap();

        let err = store.restore(other.to_snapshot()).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_snapshot_respects_capacity() {
        let store = LayeredMemory::new("c1");
        for i in 0..5 {
            store
                .add_memory(memory(&format!("beat {}", i), MemoryLayer::ShortTerm, "alice"))
                .unwrap();
        }
        let config = MemoryConfigBuilder::new().short_term_capacity(3).build().unwrap();
        assert!(LayeredMemory::from_snapshot(store.to_snapshot(), config).is_err());
    }

    #[test]
    fn test_linked_resolves_live_references() {
        let store = LayeredMemory::new("c1");
        let cause = store
            .add_memory(memory("the dam broke", MemoryLayer::LongTerm, "alice"))
            .unwrap();
        let effect = store
            .add_memory(
                memory("the valley flooded", MemoryLayer::MidTerm, "alice")
                    .with_causal_links([cause.clone()])
                    .with_associations(["missing-id"]),
            )
            .unwrap();

        let linked = store.linked(&effect).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, cause);
        assert!(matches!(store.linked("nope"), Err(MemoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let store = LayeredMemory::new("c1");
        let mut events = store.events().subscribe();

        let id = store.add_memory(memory("a raven lands", MemoryLayer::MidTerm, "alice")).unwrap();
        store.recall(&RecallQuery::new());

        match events.recv().await.unwrap() {
            MemoryEvent::Created { memory_id, .. } => assert_eq!(memory_id, id),
            other => panic!("unexpected event {:?}", other),
        }
        match events.recv().await.unwrap() {
            MemoryEvent::Reinforced {
                memory_id,
                reinforcement_count,
                ..
            } => {
                assert_eq!(memory_id, id);
                assert_eq!(reinforcement_count, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events.recv().await.unwrap(),
            MemoryEvent::Recalled { results_count: 1, .. }
        ));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = Arc::new(LayeredMemory::new("c1"));
        let mut handles = Vec::new();

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let user = format!("user{}", t);
                for i in 0..50 {
                    let layer = if i % 5 == 0 { MemoryLayer::ShortTerm } else { MemoryLayer::MidTerm };
                    store
                        .add_memory(memory(&format!("{} step {}", user, i), layer, &user))
                        .unwrap();
                    if i % 10 == 0 {
                        store.recall(&RecallQuery::new().user(user.clone()));
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.stats_summary();
        assert_eq!(stats.created, 400);
        assert_eq!(stats.mid_term, 320);
        assert_eq!(stats.short_term, 50);
        assert_eq!(stats.evicted, 30);

        for t in 0..8 {
            let user = format!("user{}", t);
            let hits = store.recall(&RecallQuery::new().user(user.clone()).layer(MemoryLayer::MidTerm));
            assert_eq!(hits.len(), 40);
            assert_eq!(store.get_user_profile(&user).unwrap().memory_count, 50);
        }
    }

    #[test]
    fn test_concurrent_forget_keeps_indexes_consistent() {
        let store = Arc::new(LayeredMemory::new("c1"));
        let start = Utc::now();
        let mut handles = Vec::new();

        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let user = format!("user{}", t);
                for i in 0..60 {
                    let mut input = memory(&format!("{} errand {}", user, i), MemoryLayer::MidTerm, &user)
                        .with_emotions([Emotion::ALL[i % 3]])
                        .with_themes([format!("arc{}", i % 4)]);
                    if i % 3 == 0 {
                        input = input.with_timestamp(start - Duration::days(20));
                    }
                    store.add_memory(input).unwrap();
                }
            }));
        }

        {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..30 {
                    store.forget_at(0.1, Utc::now()).unwrap();
                    std::thread::yield_now();
                }
            }));
        }

        {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..30 {
                    store.recall(&RecallQuery::new().emotion(Emotion::Sadness).min_significance(0.3).limit(3));
                    store.recall(&RecallQuery::new().text("errand").min_significance(0.3));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        store.forget_at(0.1, Utc::now()).unwrap();

        let stats = store.stats_summary();
        assert_eq!(stats.created, 240);
        assert_eq!(stats.forgotten, 80);
        assert_eq!(stats.mid_term, 160);
        assert_eq!(store.forgotten_log().len(), 80);

        let state = store.state.read();
        let rebuilt = MemoryIndex::rebuild(state.tiers.iter());
        assert_eq!(state.index.postings(), rebuilt.postings());
        for t in 0..4 {
            let user = format!("user{}", t);
            assert_eq!(state.index.by_user(&user), rebuilt.by_user(&user));
        }
        for emotion in &Emotion::ALL[..3] {
            assert_eq!(state.index.by_emotion(*emotion), rebuilt.by_emotion(*emotion));
        }
    }
}
