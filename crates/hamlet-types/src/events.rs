//! Event envelopes exchanged between the ticker, cognition, and the host.
//!
//! The ticker never mutates agents directly; it emits [`TickEvent`]
//! records that the host routes into agent cognition between cycles.
//! Likewise the consequence engine returns deferred [`WorldChange`]
//! operations instead of reaching into structures it does not own.

use serde::{Deserialize, Serialize};

use crate::enums::TickEventKind;
use crate::time::GameTime;

/// An event emitted by the simulation ticker for the host to route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    /// What kind of event this is.
    pub kind: TickEventKind,
    /// Name of the agent the event concerns.
    pub agent: String,
    /// Prescribed memory text for awareness events.
    #[serde(default)]
    pub text: Option<String>,
    /// Memory importance for awareness events.
    #[serde(default)]
    pub importance: Option<u8>,
    /// Whether the event was generated automatically (always true for
    /// ticker output; user commands set this false).
    pub auto: bool,
}

impl TickEvent {
    /// Build an impulse event (no memory text).
    pub const fn impulse(kind: TickEventKind, agent: String) -> Self {
        Self {
            kind,
            agent,
            text: None,
            importance: None,
            auto: true,
        }
    }

    /// Build an awareness event carrying memory text and importance.
    pub const fn awareness(agent: String, text: String, importance: u8) -> Self {
        Self {
            kind: TickEventKind::Awareness,
            agent,
            text: Some(text),
            importance: Some(importance),
            auto: true,
        }
    }

    /// Build a world-awareness event for a single recipient.
    pub const fn world_awareness(agent: String, text: String, importance: u8) -> Self {
        Self {
            kind: TickEventKind::WorldAwareness,
            agent,
            text: Some(text),
            importance: Some(importance),
            auto: true,
        }
    }
}

/// A deferred structural operation produced by the consequence engine.
///
/// These are applied by the host after the producing cycle releases its
/// borrows, keeping every mutation path single-owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorldChange {
    /// Place a new building on the map.
    AddBuilding {
        /// Building name.
        name: String,
        /// Building type tag (`market_stall`, `house`, ...).
        kind: String,
        /// Owning agent, if any.
        owner: Option<String>,
    },
    /// Start a community event.
    StartCommunityEvent {
        /// Event kind tag (normalised, see `CommunityEventKind::parse`).
        kind: String,
        /// Free-form detail string from the goal or command.
        details: Option<String>,
        /// Agent who called the event.
        caller: String,
    },
    /// Append a string to every agent's knowledge set.
    BroadcastKnowledge {
        /// The knowledge text.
        text: String,
    },
    /// Install a new community leader.
    SetLeader {
        /// The new leader's name.
        name: String,
    },
    /// Register a newborn child with both partners.
    AddChild {
        /// First parent.
        parent_a: String,
        /// Second parent.
        parent_b: String,
        /// The child's given name.
        child: String,
    },
}

/// A monetary delta recorded against an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Signed amount (positive = income).
    pub amount: f64,
    /// Short reason label (`tax`, `buy_food`, `wage`, ...).
    pub reason: String,
    /// Game time of the transaction.
    pub game_time: GameTime,
}

/// A record of a topic flowing from one agent to another.
///
/// Appended by the conversation engine after successful topic diffusion
/// and surfaced in the research export as the information-flow network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoFlow {
    /// The agent the topic came from.
    pub from: String,
    /// The agent the topic reached.
    pub to: String,
    /// The topic text.
    pub topic: String,
    /// Game time of the diffusion.
    pub game_time: GameTime,
}
