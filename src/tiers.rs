//! Tier storage: a bounded short-term ring buffer and two id-keyed maps

use crate::types::{MemoryId, MemoryLayer, MemoryNode};
use std::collections::{HashMap, VecDeque};

/// Owner of every live memory node
#[derive(Debug, Clone)]
pub struct Tiers {
    short_term: VecDeque<MemoryNode>,
    short_term_capacity: usize,
    mid_term: HashMap<MemoryId, MemoryNode>,
    long_term: HashMap<MemoryId, MemoryNode>,
}

impl Tiers {
    pub fn new(short_term_capacity: usize) -> Self {
        Self {
            short_term: VecDeque::with_capacity(short_term_capacity),
            short_term_capacity,
            mid_term: HashMap::new(),
            long_term: HashMap::new(),
        }
    }

    /// Store a node in its layer
    ///
    /// Returns the short-term node pushed out of the ring buffer, if any.
    pub fn insert(&mut self, node: MemoryNode) -> Option<MemoryNode> {
        match node.layer {
            MemoryLayer::ShortTerm => {
                let evicted = if self.short_term.len() >= self.short_term_capacity {
                    self.short_term.pop_front()
                } else {
                    None
                };
                self.short_term.push_back(node);
                evicted
            }
            MemoryLayer::MidTerm => {
                self.mid_term.insert(node.id.clone(), node);
                None
            }
            MemoryLayer::LongTerm => {
                self.long_term.insert(node.id.clone(), node);
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&MemoryNode> {
        self.mid_term
            .get(id)
            .or_else(|| self.long_term.get(id))
            .or_else(|| self.short_term.iter().find(|n| n.id == id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MemoryNode> {
        if let Some(node) = self.mid_term.get_mut(id) {
            return Some(node);
        }
        if let Some(node) = self.long_term.get_mut(id) {
            return Some(node);
        }
        self.short_term.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Remove a node from the mid- or long-term tier
    ///
    /// Short-term nodes only ever leave through ring-buffer eviction.
    pub fn remove_forgettable(&mut self, id: &str) -> Option<MemoryNode> {
        self.mid_term
            .remove(id)
            .or_else(|| self.long_term.remove(id))
    }

    /// Nodes in one layer; short-term in insertion order
    pub fn layer(&self, layer: MemoryLayer) -> Box<dyn Iterator<Item = &MemoryNode> + '_> {
        match layer {
            MemoryLayer::ShortTerm => Box::new(self.short_term.iter()),
            MemoryLayer::MidTerm => Box::new(self.mid_term.values()),
            MemoryLayer::LongTerm => Box::new(self.long_term.values()),
        }
    }

    /// Every live node across all layers
    pub fn iter(&self) -> impl Iterator<Item = &MemoryNode> {
        self.short_term
            .iter()
            .chain(self.mid_term.values())
            .chain(self.long_term.values())
    }

    pub fn len(&self, layer: MemoryLayer) -> usize {
        match layer {
            MemoryLayer::ShortTerm => self.short_term.len(),
            MemoryLayer::MidTerm => self.mid_term.len(),
            MemoryLayer::LongTerm => self.long_term.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.short_term.len() + self.mid_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
