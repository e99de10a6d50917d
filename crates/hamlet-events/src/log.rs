//! The research log: conversation records, information flow, and
//! emergent phenomena.
//!
//! Everything here feeds the optional research export. Appends are
//! bounded; when a log overflows the oldest records are dropped, never
//! the caller refused.

use serde::{Deserialize, Serialize};

use hamlet_types::{BondShift, GameTime, InfoFlow};

/// Maximum records retained per log.
const LOG_CAP: usize = 2_000;

/// One line of a recorded conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationLine {
    /// Who spoke.
    pub speaker: String,
    /// What was said.
    pub text: String,
}

/// A completed conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// The initiating agent.
    pub initiator: String,
    /// The other participant.
    pub partner: String,
    /// The transcript, in speech order.
    pub lines: Vec<ConversationLine>,
    /// Topic tag.
    pub topic: String,
    /// How the bond shifted.
    pub bond: BondShift,
    /// Whether the offline template library produced it.
    pub offline: bool,
    /// Game time the conversation ended.
    pub game_time: GameTime,
}

/// An emergent phenomenon worth surfacing in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergentPhenomenon {
    /// Short kind tag (`partnership`, `leadership`, `belief`, ...).
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// When it happened.
    pub game_time: GameTime,
}

/// The accumulating research log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchLog {
    /// Completed conversations.
    pub conversations: Vec<ConversationRecord>,
    /// Topic diffusion edges.
    pub info_flows: Vec<InfoFlow>,
    /// Emergent phenomena.
    pub phenomena: Vec<EmergentPhenomenon>,
}

impl ResearchLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            conversations: Vec::new(),
            info_flows: Vec::new(),
            phenomena: Vec::new(),
        }
    }

    /// Record a completed conversation.
    pub fn record_conversation(&mut self, record: ConversationRecord) {
        self.conversations.push(record);
        trim(&mut self.conversations);
    }

    /// Record a topic diffusion edge.
    pub fn record_info_flow(&mut self, flow: InfoFlow) {
        self.info_flows.push(flow);
        trim(&mut self.info_flows);
    }

    /// Record an emergent phenomenon.
    pub fn record_phenomenon(&mut self, kind: &str, description: &str, game_time: GameTime) {
        self.phenomena.push(EmergentPhenomenon {
            kind: kind.to_owned(),
            description: description.to_owned(),
            game_time,
        });
        trim(&mut self.phenomena);
    }
}

/// Drop the oldest records past the cap.
fn trim<T>(log: &mut Vec<T>) {
    if log.len() > LOG_CAP {
        let excess = log.len().saturating_sub(LOG_CAP);
        log.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_are_bounded() {
        let mut log = ResearchLog::new();
        for i in 0..LOG_CAP.saturating_add(10) {
            log.record_phenomenon("test", &format!("phenomenon {i}"), GameTime::START);
        }
        assert_eq!(log.phenomena.len(), LOG_CAP);
        assert!(log.phenomena.first().is_some_and(|p| p.description.ends_with("10")));
    }
}
