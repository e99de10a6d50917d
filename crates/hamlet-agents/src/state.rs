//! Mutable per-agent state: needs, traits, skills, status, inventory,
//! relationships, family, and bookkeeping for cognition.
//!
//! All automatic writes go through the clamping helpers here; nothing
//! outside this module mutates the numeric maps directly. Status values
//! live in [0,100] except wealth, which may exceed 100 up to a bounded
//! ceiling but never goes negative.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hamlet_types::{AgentId, FrozenFields, GameTime, LifeStage, TilePos, Transaction, WorldDef};

use crate::error::AgentError;
use crate::inventory::Inventory;
use crate::knowledge::Knowledge;
use crate::relationships::Relationship;

/// Ceiling on wealth (exceptional fortunes clamp here).
pub const WEALTH_CEILING: f64 = 10_000.0;

/// Number of transactions kept in the ring.
pub const TRANSACTION_RING: usize = 50;

/// Status ids the engine always initialises.
pub const CORE_STATUS: &[&str] = &["health", "wealth", "reputation", "happiness", "energy"];

/// Need ids used when no world definition is active.
pub const FALLBACK_NEEDS: &[&str] = &["hunger", "rest", "social", "fun", "purpose", "romance"];

/// What an agent is outwardly doing, as far as the scheduler cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Available for the full cognitive pipeline.
    #[default]
    Idle,
    /// Walking somewhere; cognition still runs.
    Moving,
    /// Locked into a conversation; the pair is owned by one cycle.
    Talking,
    /// Asleep; only urgent events interrupt.
    Sleeping,
}

/// The complete mutable state of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable identifier.
    pub id: AgentId,
    /// Unique display name; relationships key on it.
    pub name: String,
    /// Free-text personality, the source of the trait parse.
    pub personality: String,
    /// Occupation id from the world definition, if any.
    pub occupation: Option<String>,
    /// Age in years.
    pub age: u32,
    /// Current tile position (written by the motion collaborator).
    pub pos: TilePos,
    /// Needs in [0,1]; 0 = satisfied, 1 = desperate.
    pub needs: BTreeMap<String, f64>,
    /// Persistent traits in [0,1].
    pub traits: BTreeMap<String, f64>,
    /// Practice-grown skills in [0,10].
    pub skills: BTreeMap<String, f64>,
    /// Status values in [0,100] (wealth may exceed, see `WEALTH_CEILING`).
    pub status: BTreeMap<String, f64>,
    /// Carried items, total quantity capped.
    pub inventory: Inventory,
    /// Directed relationship records keyed by the other agent's name.
    pub relationships: BTreeMap<String, Relationship>,
    /// Partner name, if partnered.
    pub partner: Option<String>,
    /// Children identifiers.
    pub children: Vec<String>,
    /// Whether the agent already runs a market stall.
    pub owns_business: bool,
    /// Ring of the last monetary deltas.
    pub transactions: VecDeque<Transaction>,
    /// User-pinned fields the ticker must skip.
    pub frozen: FrozenFields,
    /// Gossip topics and community facts.
    pub knowledge: Knowledge,
    /// What the agent is currently doing, as a sentence fragment.
    pub current_activity: String,
    /// Scheduler-visible mode.
    pub mode: AgentMode,
    /// Conversation target the agent is walking toward.
    pub pending_conversation: Option<String>,
    /// Agent currently being followed; the decide-and-act ladder
    /// continues the pursuit before considering anything else.
    pub follow_target: Option<String>,
    /// Set when a user edited this agent; jumps the cognition queue once.
    pub priority: bool,
    /// Names of agents already seen (perception dedup).
    pub seen_agents: BTreeSet<String>,
    /// Names of buildings already seen (perception dedup).
    pub seen_buildings: BTreeSet<String>,
    /// Building whose doorstep the agent last crossed.
    pub known_building: Option<String>,
    /// Sticky awareness flags, keyed by threshold id.
    pub awareness_flags: BTreeSet<String>,
    /// Real time of the last seek-company impulse (45 s cooldown).
    pub last_seek_company: Option<DateTime<Utc>>,
    /// Real time of the last conversation this agent initiated.
    pub last_conversation: Option<DateTime<Utc>>,
    /// Game time of the last community event this agent called.
    pub last_event_called: Option<GameTime>,
}

impl AgentState {
    /// Create an agent with defaults drawn from the world definition
    /// (or the built-in fallbacks when none is active).
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        occupation: Option<String>,
        age: u32,
        pos: TilePos,
        world_def: Option<&WorldDef>,
    ) -> Self {
        let personality = personality.into();

        let mut needs = BTreeMap::new();
        match world_def {
            Some(def) if !def.needs.is_empty() => {
                for need in &def.needs {
                    needs.insert(need.id.clone(), 0.2);
                }
            }
            _ => {
                for id in FALLBACK_NEEDS {
                    needs.insert((*id).to_owned(), 0.2);
                }
            }
        }

        let mut skills = BTreeMap::new();
        if let Some(def) = world_def {
            for skill in &def.skills {
                skills.insert(skill.id.clone(), 0.0);
            }
        }

        let mut status = BTreeMap::new();
        status.insert("health".to_owned(), 90.0);
        status.insert("wealth".to_owned(), 50.0);
        status.insert("reputation".to_owned(), 50.0);
        status.insert("happiness".to_owned(), 60.0);
        status.insert("energy".to_owned(), 80.0);

        let extra_traits = world_def.map(|def| def.traits.as_slice()).unwrap_or(&[]);
        let traits = crate::personality::derive_traits(&personality, extra_traits);

        Self {
            id: AgentId::new(),
            name: name.into(),
            personality,
            occupation,
            age,
            pos,
            needs,
            traits,
            skills,
            status,
            inventory: Inventory::new(),
            relationships: BTreeMap::new(),
            partner: None,
            children: Vec::new(),
            owns_business: false,
            transactions: VecDeque::new(),
            frozen: FrozenFields::new(),
            knowledge: Knowledge::new(),
            current_activity: "settling in".to_owned(),
            mode: AgentMode::Idle,
            pending_conversation: None,
            follow_target: None,
            priority: false,
            seen_agents: BTreeSet::new(),
            seen_buildings: BTreeSet::new(),
            known_building: None,
            awareness_flags: BTreeSet::new(),
            last_seek_company: None,
            last_conversation: None,
            last_event_called: None,
        }
    }

    // -----------------------------------------------------------------------
    // Clamped accessors
    // -----------------------------------------------------------------------

    /// Read a need (0 when the need is not declared).
    pub fn need(&self, id: &str) -> f64 {
        self.needs.get(id).copied().unwrap_or(0.0)
    }

    /// Add to a need, clamping into [0,1].
    pub fn add_need(&mut self, id: &str, delta: f64) {
        let entry = self.needs.entry(id.to_owned()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, 1.0);
    }

    /// Set a need outright, clamping into [0,1].
    pub fn set_need(&mut self, id: &str, value: f64) {
        self.needs.insert(id.to_owned(), value.clamp(0.0, 1.0));
    }

    /// Read a trait (0.5 baseline when unknown).
    pub fn trait_value(&self, id: &str) -> f64 {
        self.traits.get(id).copied().unwrap_or(0.5)
    }

    /// Read a skill (0 when unknown).
    pub fn skill(&self, id: &str) -> f64 {
        self.skills.get(id).copied().unwrap_or(0.0)
    }

    /// Add to a skill, clamping into [0,10].
    pub fn add_skill(&mut self, id: &str, delta: f64) {
        let entry = self.skills.entry(id.to_owned()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, 10.0);
    }

    /// Read a status value (0 when unknown).
    pub fn status_value(&self, id: &str) -> f64 {
        self.status.get(id).copied().unwrap_or(0.0)
    }

    /// Add to a status value.
    ///
    /// Wealth clamps into [0, `WEALTH_CEILING`]; everything else into
    /// [0,100].
    pub fn add_status(&mut self, id: &str, delta: f64) {
        let ceiling = if id == "wealth" { WEALTH_CEILING } else { 100.0 };
        let entry = self.status.entry(id.to_owned()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, ceiling);
    }

    /// Set a status value outright, with the same clamps as `add_status`.
    pub fn set_status(&mut self, id: &str, value: f64) {
        let ceiling = if id == "wealth" { WEALTH_CEILING } else { 100.0 };
        self.status.insert(id.to_owned(), value.clamp(0.0, ceiling));
    }

    /// Current wealth.
    pub fn wealth(&self) -> f64 {
        self.status_value("wealth")
    }

    /// Mean over all needs (0 when none are declared).
    pub fn mean_needs(&self) -> f64 {
        if self.needs.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.needs.values().sum();
        sum / self.needs.len() as f64
    }

    /// Life stage derived from age.
    pub const fn life_stage(&self) -> LifeStage {
        LifeStage::from_age(self.age)
    }

    // -----------------------------------------------------------------------
    // Money
    // -----------------------------------------------------------------------

    /// Spend wealth, recording the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InsufficientFunds`] and leaves state
    /// untouched when the amount would overdraw.
    pub fn spend(
        &mut self,
        amount: f64,
        reason: &str,
        game_time: GameTime,
    ) -> Result<(), AgentError> {
        if amount < 0.0 {
            return Ok(());
        }
        let wealth = self.wealth();
        if wealth < amount {
            return Err(AgentError::InsufficientFunds {
                agent: self.name.clone(),
                amount,
                wealth,
            });
        }
        self.add_status("wealth", -amount);
        self.record_transaction(-amount, reason, game_time);
        Ok(())
    }

    /// Receive wealth, recording the transaction.
    pub fn earn(&mut self, amount: f64, reason: &str, game_time: GameTime) {
        if amount <= 0.0 {
            return;
        }
        self.add_status("wealth", amount);
        self.record_transaction(amount, reason, game_time);
    }

    /// Append to the bounded transaction ring.
    pub fn record_transaction(&mut self, amount: f64, reason: &str, game_time: GameTime) {
        self.transactions.push_back(Transaction {
            amount,
            reason: reason.to_owned(),
            game_time,
        });
        while self.transactions.len() > TRANSACTION_RING {
            self.transactions.pop_front();
        }
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    /// The relationship record toward another agent, created lazily.
    pub fn relationship_mut(&mut self, other: &str) -> &mut Relationship {
        self.relationships
            .entry(other.to_owned())
            .or_default()
    }

    /// Read-only relationship lookup.
    pub fn relationship(&self, other: &str) -> Option<&Relationship> {
        self.relationships.get(other)
    }

    /// The known peer with the highest familiarity, if any.
    pub fn most_familiar_peer(&self) -> Option<(&str, &Relationship)> {
        self.relationships
            .iter()
            .max_by(|a, b| a.1.familiarity.total_cmp(&b.1.familiarity))
            .map(|(name, rel)| (name.as_str(), rel))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn agent() -> AgentState {
        AgentState::new("Elena", "a quiet, ambitious baker", None, 29, TilePos::new(0, 0), None)
    }

    #[test]
    fn new_agent_has_fallback_needs_and_core_status() {
        let a = agent();
        for id in FALLBACK_NEEDS {
            assert!(a.needs.contains_key(*id));
        }
        for id in CORE_STATUS {
            assert!(a.status.contains_key(*id));
        }
        assert_eq!(a.life_stage(), LifeStage::Adult);
    }

    #[test]
    fn traits_come_from_the_personality_text() {
        let a = agent();
        assert!(a.trait_value("introversion") > 0.5);
        assert!(a.trait_value("ambition") > 0.5);
    }

    #[test]
    fn needs_clamp_to_unit_range() {
        let mut a = agent();
        a.add_need("hunger", 5.0);
        assert!((a.need("hunger") - 1.0).abs() < f64::EPSILON);
        a.add_need("hunger", -5.0);
        assert!(a.need("hunger").abs() < f64::EPSILON);
    }

    #[test]
    fn wealth_never_overdraws() {
        let mut a = agent();
        let err = a.spend(1_000.0, "buy_castle", GameTime::START);
        assert!(err.is_err());
        assert!((a.wealth() - 50.0).abs() < f64::EPSILON);
        a.spend(10.0, "buy_food", GameTime::START).unwrap();
        assert!((a.wealth() - 40.0).abs() < f64::EPSILON);
        assert_eq!(a.transactions.len(), 1);
    }

    #[test]
    fn wealth_may_exceed_100_but_not_the_ceiling() {
        let mut a = agent();
        a.earn(500.0, "inheritance", GameTime::START);
        assert!((a.wealth() - 550.0).abs() < f64::EPSILON);
        a.earn(1e9, "dragon hoard", GameTime::START);
        assert!((a.wealth() - WEALTH_CEILING).abs() < f64::EPSILON);
    }

    #[test]
    fn transaction_ring_is_bounded() {
        let mut a = agent();
        for i in 0..60 {
            a.record_transaction(f64::from(i), "tick", GameTime::START);
        }
        assert_eq!(a.transactions.len(), TRANSACTION_RING);
        assert!((a.transactions.front().unwrap().amount - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn other_status_clamps_at_100() {
        let mut a = agent();
        a.add_status("happiness", 500.0);
        assert!((a.status_value("happiness") - 100.0).abs() < f64::EPSILON);
    }
}
