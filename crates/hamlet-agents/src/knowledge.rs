//! Hot topics and the agent knowledge set.
//!
//! A hot topic is a gossip item the agent holds and may diffuse during
//! conversation. Topics live for 48 game-hours, then expire. Diffusion
//! marks a topic as spread to a specific partner so the same pair never
//! re-trades the same news; the receiving copy loses one point of
//! importance (floor 4).
//!
//! The knowledge set is a bounded list of community-wide facts (who
//! partnered whom, who leads) appended by consequence broadcasts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use hamlet_types::GameTime;

/// Game-hours a hot topic stays alive.
pub const TOPIC_TTL_HOURS: u64 = 48;

/// Importance floor for a diffused topic copy.
pub const DIFFUSED_IMPORTANCE_FLOOR: f64 = 4.0;

/// Maximum knowledge entries retained (oldest dropped first).
const KNOWLEDGE_CAP: usize = 100;

/// A gossip item an agent holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotTopic {
    /// The topic text.
    pub text: String,
    /// How newsworthy the topic is, [1,10].
    pub importance: f64,
    /// When the agent learned it.
    pub learned_at: GameTime,
    /// Names of agents this topic has already been spread to.
    pub spread_to: BTreeSet<String>,
}

/// An agent's gossip and community knowledge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    /// Live gossip items.
    topics: Vec<HotTopic>,
    /// Community-wide facts, oldest first.
    facts: Vec<String>,
}

impl Knowledge {
    /// Create an empty knowledge store.
    pub const fn new() -> Self {
        Self {
            topics: Vec::new(),
            facts: Vec::new(),
        }
    }

    /// Add a hot topic, deduplicating on the text.
    ///
    /// A duplicate refreshes the timestamp and keeps the higher
    /// importance; spread markers are preserved.
    pub fn add_hot_topic(&mut self, text: &str, importance: f64, now: GameTime) {
        let importance = importance.clamp(1.0, 10.0);
        if let Some(existing) = self.topics.iter_mut().find(|t| t.text == text) {
            existing.learned_at = now;
            existing.importance = existing.importance.max(importance);
            return;
        }
        self.topics.push(HotTopic {
            text: text.to_owned(),
            importance,
            learned_at: now,
            spread_to: BTreeSet::new(),
        });
    }

    /// All live topics.
    pub fn topics(&self) -> &[HotTopic] {
        &self.topics
    }

    /// Topics not yet spread to `partner`, hottest first.
    pub fn undiscussed_topics(&self, partner: &str) -> Vec<&HotTopic> {
        let mut topics: Vec<&HotTopic> = self
            .topics
            .iter()
            .filter(|t| !t.spread_to.contains(partner))
            .collect();
        topics.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        topics
    }

    /// Mark a topic as spread to `partner`.
    pub fn mark_spread(&mut self, text: &str, partner: &str) {
        if let Some(topic) = self.topics.iter_mut().find(|t| t.text == text) {
            topic.spread_to.insert(partner.to_owned());
        }
    }

    /// Drop topics older than the TTL.
    pub fn expire_topics(&mut self, now: GameTime) {
        self.topics.retain(|t| {
            now.minutes_since(t.learned_at) < TOPIC_TTL_HOURS.saturating_mul(60)
        });
    }

    /// Receive a topic from another agent during diffusion.
    ///
    /// The copy arrives one point less important, floored at 4.
    pub fn receive_topic(&mut self, text: &str, source_importance: f64, now: GameTime) {
        let importance = (source_importance - 1.0).max(DIFFUSED_IMPORTANCE_FLOOR);
        self.add_hot_topic(text, importance, now);
    }

    /// Append a community-wide fact.
    pub fn learn_fact(&mut self, fact: &str) {
        if self.facts.iter().any(|f| f == fact) {
            return;
        }
        self.facts.push(fact.to_owned());
        if self.facts.len() > KNOWLEDGE_CAP {
            let excess = self.facts.len().saturating_sub(KNOWLEDGE_CAP);
            self.facts.drain(..excess);
        }
    }

    /// All known facts, oldest first.
    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    /// The most recent `k` facts, newest first.
    pub fn recent_facts(&self, k: usize) -> Vec<&str> {
        self.facts.iter().rev().take(k).map(String::as_str).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn topics_expire_after_ttl() {
        let mut k = Knowledge::new();
        let start = GameTime::new(1, 6, 0);
        k.add_hot_topic("fire at the bakery", 7.0, start);
        k.expire_topics(GameTime::new(2, 6, 0));
        assert_eq!(k.topics().len(), 1);
        k.expire_topics(GameTime::new(3, 6, 0));
        assert!(k.topics().is_empty());
    }

    #[test]
    fn diffusion_drops_importance_with_floor() {
        let mut k = Knowledge::new();
        let now = GameTime::START;
        k.receive_topic("fire at the bakery", 7.0, now);
        assert!((k.topics().first().unwrap().importance - 6.0).abs() < f64::EPSILON);
        k.receive_topic("small news", 4.0, now);
        let small = k.topics().iter().find(|t| t.text == "small news").unwrap();
        assert!((small.importance - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn undiscussed_filters_spread_partners() {
        let mut k = Knowledge::new();
        let now = GameTime::START;
        k.add_hot_topic("harvest is early", 5.0, now);
        k.add_hot_topic("fire at the bakery", 7.0, now);
        k.mark_spread("harvest is early", "Bram");
        let undiscussed = k.undiscussed_topics("Bram");
        assert_eq!(undiscussed.len(), 1);
        assert_eq!(undiscussed.first().unwrap().text, "fire at the bakery");
        assert_eq!(k.undiscussed_topics("Mira").len(), 2);
    }

    #[test]
    fn facts_deduplicate() {
        let mut k = Knowledge::new();
        k.learn_fact("Elena and Bram are partners");
        k.learn_fact("Elena and Bram are partners");
        assert_eq!(k.facts().len(), 1);
    }
}
