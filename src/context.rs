//! Context window assembly for text generation
//!
//! Renders ranked recall hits (and optionally the player's profile) into a
//! token-budgeted block of text the narrative generator can be prompted
//! with. The memory core never reads the generator's output.

use crate::profile::UserProfile;
use crate::recall::RecallHit;
use crate::types::MemoryNode;
use serde_json::Value;

/// Context window builder
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Maximum token budget (approximate)
    pub max_tokens: usize,
    /// Include the user's dominant emotions and themes
    pub include_profile: bool,
    /// Maximum number of memories to render
    pub max_items: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            include_profile: true,
            max_items: 12,
        }
    }
}

impl ContextWindow {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    /// Rough token estimation (~0.75 tokens per character)
    pub fn estimate_tokens(text: &str) -> usize {
        (text.len() as f64 * 0.75).ceil() as usize
    }

    /// Build context string within the token budget
    ///
    /// Hits are rendered in the order given; rendering stops at the first
    /// line that would overflow the budget.
    pub fn build(&self, hits: &[RecallHit], profile: Option<&UserProfile>) -> String {
        let mut output = String::new();
        let mut remaining = self.max_tokens;

        if self.include_profile {
            if let Some(section) = profile.and_then(render_profile) {
                let tokens = Self::estimate_tokens(&section);
                if tokens <= remaining {
                    output.push_str(&section);
                    remaining -= tokens;
                }
            }
        }

        if hits.is_empty() {
            return output;
        }

        let header = "## Story So Far\n";
        let header_tokens = Self::estimate_tokens(header);
        if header_tokens > remaining {
            return output;
        }
        output.push_str(header);
        remaining -= header_tokens;

        for hit in hits.iter().take(self.max_items) {
            let line = render_line(hit);
            let tokens = Self::estimate_tokens(&line);
            if tokens > remaining {
                break;
            }
            output.push_str(&line);
            remaining -= tokens;
        }

        output
    }
}

fn render_profile(profile: &UserProfile) -> Option<String> {
    let emotions = profile.top_emotions(3);
    let themes = profile.top_themes(3);
    if emotions.is_empty() && themes.is_empty() {
        return None;
    }

    let mut section = String::from("## Player Tendencies\n");
    if !emotions.is_empty() {
        let list: Vec<String> = emotions.iter().map(|(e, c)| format!("{} ({})", e, c)).collect();
        section.push_str(&format!("- Emotions: {}\n", list.join(", ")));
    }
    if !themes.is_empty() {
        let list: Vec<String> = themes.iter().map(|(t, c)| format!("{} ({})", t, c)).collect();
        section.push_str(&format!("- Themes: {}\n", list.join(", ")));
    }
    section.push('\n');
    Some(section)
}

fn render_line(hit: &RecallHit) -> String {
    let node = &hit.node;
    let mut line = format!("- [{}] {}", node.memory_type, render_content(node));

    let mut notes = Vec::new();
    if !node.emotional_context.is_empty() {
        let emotions: Vec<&str> = node.emotional_context.iter().map(|e| e.as_str()).collect();
        notes.push(format!("feels: {}", emotions.join(", ")));
    }
    if !node.thematic_tags.is_empty() {
        let themes: Vec<&str> = node.thematic_tags.iter().map(String::as_str).collect();
        notes.push(format!("themes: {}", themes.join(", ")));
    }
    notes.push(format!("significance: {:.2}", hit.significance));

    line.push_str(&format!(" ({})\n", notes.join("; ")));
    line
}

/// Flatten content to `key: value` pairs without interpreting it
fn render_content(node: &MemoryNode) -> String {
    if node.content.is_empty() {
        return "(no details)".to_string();
    }
    node.content
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
