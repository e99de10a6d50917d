//! Enumeration types for the Hamlet simulation.
//!
//! Closed sets only. Everything driven by the world definition (needs,
//! skills, resources, occupations, actions) is string-keyed so that a new
//! world schema never requires a recompile; the enums here describe the
//! engine's own vocabulary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Memory kinds
// ---------------------------------------------------------------------------

/// The kind of a memory entry in an agent's memory stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the agent perceived directly.
    Observation,
    /// A synthesised insight derived from other memories.
    Reflection,
    /// A plan entry the agent committed to.
    Plan,
    /// A line of conversation the agent took part in or overheard.
    Dialogue,
    /// A world or community event the agent became aware of.
    Event,
}

impl MemoryKind {
    /// Stable label used in prompts, logs, and the research export.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Reflection => "reflection",
            Self::Plan => "plan",
            Self::Dialogue => "dialogue",
            Self::Event => "event",
        }
    }
}

// ---------------------------------------------------------------------------
// Life stages
// ---------------------------------------------------------------------------

/// Coarse life stage derived from an agent's age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    /// Under 16 years.
    Child,
    /// 16 to 59 years.
    Adult,
    /// 60 years and older.
    Elder,
}

impl LifeStage {
    /// Derive the life stage from an age in years.
    pub const fn from_age(age: u32) -> Self {
        if age < 16 {
            Self::Child
        } else if age < 60 {
            Self::Adult
        } else {
            Self::Elder
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation outcomes
// ---------------------------------------------------------------------------

/// How a conversation shifted the bond between its two participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondShift {
    /// The pair grew closer (trust and familiarity rise).
    Closer,
    /// No meaningful change beyond familiarity from contact.
    Neutral,
    /// Friction surfaced (trust falls, rivalry can rise).
    Tension,
}

impl BondShift {
    /// Parse the oracle's bond tag, defaulting to [`Self::Neutral`] on
    /// anything unrecognised.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "closer" | "warm" | "positive" => Self::Closer,
            "tension" | "tense" | "negative" | "hostile" => Self::Tension,
            _ => Self::Neutral,
        }
    }
}

// ---------------------------------------------------------------------------
// Tick events
// ---------------------------------------------------------------------------

/// The kind of an event emitted by the simulation ticker.
///
/// These are queued by the ticker and drained by the host between
/// cognitive cycles; they never mutate agents directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickEventKind {
    /// Hunger crossed the impulse threshold and the agent can afford food.
    BuyFood,
    /// Social need crossed the impulse threshold (45 s per-agent cooldown).
    SeekCompany,
    /// Romance need crossed the impulse threshold and the agent is single.
    SeekRomance,
    /// Ambition and reputation qualify the agent for a leadership bid.
    SeekLeadership,
    /// A per-agent need or status threshold crossing worth remembering.
    Awareness,
    /// A world-level alert broadcast to every agent.
    WorldAwareness,
}

// ---------------------------------------------------------------------------
// Community events
// ---------------------------------------------------------------------------

/// The kind of a community event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityEventKind {
    /// Leadership election.
    Election,
    /// Seasonal festival.
    Festival,
    /// Town meeting.
    Meeting,
    /// Political rally.
    Rally,
    /// Protest against the current governance.
    Protest,
    /// Public trial.
    Trial,
    /// Public debate.
    Debate,
    /// Informal gathering.
    Gathering,
    /// Oracle-generated event with free-form phases (wedding, funeral, ...).
    Dynamic(String),
}

impl CommunityEventKind {
    /// Parse a command or goal tag into an event kind.
    ///
    /// Unknown tags become [`Self::Dynamic`] so that oracle-invented event
    /// types still run through the phase machine.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "election" => Self::Election,
            "festival" => Self::Festival,
            "meeting" => Self::Meeting,
            "rally" => Self::Rally,
            "protest" => Self::Protest,
            "trial" => Self::Trial,
            "debate" => Self::Debate,
            "gathering" => Self::Gathering,
            other => Self::Dynamic(other.to_owned()),
        }
    }

    /// Stable label for logs and announcements.
    pub fn label(&self) -> &str {
        match self {
            Self::Election => "election",
            Self::Festival => "festival",
            Self::Meeting => "meeting",
            Self::Rally => "rally",
            Self::Protest => "protest",
            Self::Trial => "trial",
            Self::Debate => "debate",
            Self::Gathering => "gathering",
            Self::Dynamic(name) => name.as_str(),
        }
    }

    /// Whether bystanders should keep their distance.
    ///
    /// Protests are volatile by nature; dynamic events count when their
    /// tag names a hazard (fires, riots).
    pub fn is_dangerous(&self) -> bool {
        match self {
            Self::Protest => true,
            Self::Dynamic(name) => {
                let lowered = name.to_lowercase();
                lowered.contains("fire") || lowered.contains("riot")
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

/// Ambient weather, rolled daily by world evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    /// Clear skies.
    #[default]
    Clear,
    /// Overcast.
    Cloudy,
    /// Rain; slightly boosts fertility.
    Rain,
    /// Storm; dampens outdoor production.
    Storm,
    /// Snow; winter flavour.
    Snow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_stage_boundaries() {
        assert_eq!(LifeStage::from_age(0), LifeStage::Child);
        assert_eq!(LifeStage::from_age(15), LifeStage::Child);
        assert_eq!(LifeStage::from_age(16), LifeStage::Adult);
        assert_eq!(LifeStage::from_age(59), LifeStage::Adult);
        assert_eq!(LifeStage::from_age(60), LifeStage::Elder);
    }

    #[test]
    fn bond_shift_parses_loosely() {
        assert_eq!(BondShift::parse("Closer"), BondShift::Closer);
        assert_eq!(BondShift::parse(" tension "), BondShift::Tension);
        assert_eq!(BondShift::parse("???"), BondShift::Neutral);
    }

    #[test]
    fn community_event_kind_falls_back_to_dynamic() {
        assert_eq!(
            CommunityEventKind::parse("wedding"),
            CommunityEventKind::Dynamic("wedding".to_owned())
        );
        assert_eq!(CommunityEventKind::parse("Festival"), CommunityEventKind::Festival);
    }

    #[test]
    fn danger_covers_protests_and_hazardous_dynamics() {
        assert!(CommunityEventKind::Protest.is_dangerous());
        assert!(CommunityEventKind::parse("barn fire").is_dangerous());
        assert!(!CommunityEventKind::Festival.is_dangerous());
        assert!(!CommunityEventKind::parse("wedding").is_dangerous());
    }
}
