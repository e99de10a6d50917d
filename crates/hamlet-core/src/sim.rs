//! The simulation aggregate: world, agents, events, and shared logs.
//!
//! Ownership follows the single-writer rule: the simulation owns the
//! world state and the agent collection; each agent owns its own memory,
//! reflection, and plan. Cross-agent effects are queued as event records
//! and drained by the host between cognitive cycles, never applied
//! re-entrantly.

use std::collections::{BTreeMap, VecDeque};

use tracing::info;

use hamlet_agents::Agent;
use hamlet_events::{CommunityEvent, EventManager, ResearchLog};
use hamlet_types::{
    CommunityEventKind, GameTime, TickEvent, TilePos, WorldChange, WorldDef,
};
use hamlet_world::{EnvironmentTree, RESOURCE_CEILING, WorldState};

use crate::clock::GameClock;
use crate::config::SimConfig;
use crate::error::CoreError;

/// The complete mutable simulation.
#[derive(Debug)]
pub struct Simulation {
    /// Tunable parameters.
    pub config: SimConfig,
    /// The active world definition, immutable for the run.
    pub world_def: Option<WorldDef>,
    /// World-level state.
    pub world: WorldState,
    /// All agents, keyed by unique name.
    pub agents: BTreeMap<String, Agent>,
    /// The game clock and accumulators.
    pub clock: GameClock,
    /// Active community events.
    pub events: EventManager,
    /// Object states inside buildings.
    pub environment: EnvironmentTree,
    /// Conversation, info-flow, and phenomenon records.
    pub log: ResearchLog,
    /// Ticker events awaiting routing into cognition.
    pub pending_events: VecDeque<TickEvent>,
    /// Deferred structural operations awaiting application.
    pub pending_world_changes: VecDeque<WorldChange>,
}

impl Simulation {
    /// Create a simulation with no agents yet.
    pub fn new(config: SimConfig, world_def: Option<WorldDef>) -> Self {
        let world = WorldState::new(world_def.as_ref(), 0);
        let clock = GameClock::new(config.seconds_per_game_minute);
        Self {
            config,
            world_def,
            world,
            agents: BTreeMap::new(),
            clock,
            events: EventManager::new(),
            environment: EnvironmentTree::new(),
            log: ResearchLog::new(),
            pending_events: VecDeque::new(),
            pending_world_changes: VecDeque::new(),
        }
    }

    /// Current game time.
    pub const fn game_time(&self) -> GameTime {
        self.clock.time()
    }

    /// Price of an item: world definition first, then the economy table.
    pub fn price(&self, item: &str) -> f64 {
        self.world_def
            .as_ref()
            .map_or_else(|| self.world.price(item), |def| def.price(item))
    }

    // -----------------------------------------------------------------------
    // Agent management
    // -----------------------------------------------------------------------

    /// Add a new character to the simulation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateAgent`] when the name is taken; the
    /// simulation state is untouched on failure.
    pub fn add_character(
        &mut self,
        name: &str,
        personality: &str,
        occupation: Option<String>,
        age: u32,
        pos: TilePos,
    ) -> Result<(), CoreError> {
        if self.agents.contains_key(name) {
            return Err(CoreError::DuplicateAgent {
                name: name.to_owned(),
            });
        }
        let mut agent = Agent::new(
            name,
            personality,
            occupation,
            age,
            pos,
            self.world_def.as_ref(),
            self.game_time(),
        );
        agent
            .memory
            .set_cadence(self.config.seconds_per_game_minute);
        self.agents.insert(name.to_owned(), agent);
        self.world.population = self.world.population.saturating_add(1);
        info!(agent = name, population = self.world.population, "character added");
        Ok(())
    }

    /// Read-only agent lookup.
    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    /// Mutable agent lookup.
    pub fn agent_mut(&mut self, name: &str) -> Option<&mut Agent> {
        self.agents.get_mut(name)
    }

    /// Disjoint mutable borrows of two different agents.
    ///
    /// Returns `None` when the names match or either is missing; the
    /// caller never observes a half-resolved pair.
    pub fn two_agents_mut(&mut self, a: &str, b: &str) -> Option<(&mut Agent, &mut Agent)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (name, agent) in &mut self.agents {
            if name == a {
                first = Some(agent);
            } else if name == b {
                second = Some(agent);
            }
        }
        first.zip(second)
    }

    // -----------------------------------------------------------------------
    // Deferred world changes
    // -----------------------------------------------------------------------

    /// Queue a deferred structural operation.
    pub fn queue_world_change(&mut self, change: WorldChange) {
        self.pending_world_changes.push_back(change);
    }

    /// Apply queued world changes.
    ///
    /// Changes the simulation cannot fully apply itself (new buildings
    /// need the host's tile map) are returned for the host to finish.
    pub fn drain_world_changes(&mut self) -> Vec<WorldChange> {
        let mut for_host = Vec::new();
        while let Some(change) = self.pending_world_changes.pop_front() {
            match change {
                WorldChange::BroadcastKnowledge { ref text } => {
                    for agent in self.agents.values_mut() {
                        agent.state.knowledge.learn_fact(text);
                    }
                }
                WorldChange::SetLeader { ref name } => {
                    self.world.governance.leader = Some(name.clone());
                    self.log.record_phenomenon(
                        "leadership",
                        &format!("{name} became the community leader"),
                        self.clock.time(),
                    );
                }
                WorldChange::AddChild {
                    ref parent_a,
                    ref parent_b,
                    ref child,
                } => {
                    for parent in [parent_a, parent_b] {
                        if let Some(agent) = self.agents.get_mut(parent) {
                            agent.state.children.push(child.clone());
                        }
                    }
                    self.world.population = self.world.population.saturating_add(1);
                    self.log.record_phenomenon(
                        "birth",
                        &format!("{child} was born to {parent_a} and {parent_b}"),
                        self.clock.time(),
                    );
                }
                WorldChange::StartCommunityEvent {
                    ref kind,
                    ref details,
                    ref caller,
                } => {
                    let kind = CommunityEventKind::parse(kind);
                    let mut event = CommunityEvent::new(kind, caller, details.clone());
                    // The caller's position is the best venue guess the
                    // simulation has; user-started events stay unplaced.
                    if let Some(agent) = self.agents.get(caller) {
                        event = event.with_venue(agent.state.pos);
                    }
                    self.events.start(event);
                }
                WorldChange::AddBuilding { ref name, .. } => {
                    self.world.building_condition.insert(name.clone(), 100.0);
                    for_host.push(change);
                }
            }
        }
        for_host
    }

    // -----------------------------------------------------------------------
    // User commands (pinning)
    // -----------------------------------------------------------------------

    /// Pin a world resource to a value for the default freeze window.
    pub fn pin_world_resource(&mut self, resource: &str, value: f64) {
        self.world
            .resources
            .insert(resource.to_owned(), value.clamp(0.0, RESOURCE_CEILING));
        self.world.frozen.freeze(&format!("resources.{resource}"));
    }

    /// Pin an agent need to a value for the default freeze window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownAgent`] when the agent does not exist;
    /// no state changes.
    pub fn pin_agent_need(&mut self, name: &str, need: &str, value: f64) -> Result<(), CoreError> {
        let agent = self.agents.get_mut(name).ok_or_else(|| CoreError::UnknownAgent {
            name: name.to_owned(),
        })?;
        agent.state.set_need(need, value);
        agent.state.frozen.freeze(&format!("needs.{need}"));
        agent.state.priority = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sim_with_pair() -> Simulation {
        let mut sim = Simulation::new(SimConfig::default(), None);
        sim.add_character("Elena", "a quiet baker", Some("baker".to_owned()), 29, TilePos::new(1, 1))
            .unwrap();
        sim.add_character("Bram", "an outgoing farmer", Some("farmer".to_owned()), 33, TilePos::new(2, 2))
            .unwrap();
        sim
    }

    #[test]
    fn duplicate_names_are_rejected_without_mutation() {
        let mut sim = sim_with_pair();
        assert_eq!(sim.world.population, 2);
        assert!(sim
            .add_character("Elena", "an impostor", None, 40, TilePos::new(0, 0))
            .is_err());
        assert_eq!(sim.world.population, 2);
        assert_eq!(sim.agent("Elena").unwrap().state.age, 29);
    }

    #[test]
    fn two_agents_mut_is_all_or_nothing() {
        let mut sim = sim_with_pair();
        assert!(sim.two_agents_mut("Elena", "Bram").is_some());
        assert!(sim.two_agents_mut("Elena", "Elena").is_none());
        assert!(sim.two_agents_mut("Elena", "Ghost").is_none());
    }

    #[test]
    fn broadcast_knowledge_reaches_everyone() {
        let mut sim = sim_with_pair();
        sim.queue_world_change(WorldChange::BroadcastKnowledge {
            text: "Elena and Bram are partners".to_owned(),
        });
        let leftover = sim.drain_world_changes();
        assert!(leftover.is_empty());
        for agent in sim.agents.values() {
            assert!(agent
                .state
                .knowledge
                .facts()
                .iter()
                .any(|f| f.contains("partners")));
        }
    }

    #[test]
    fn add_building_is_handed_back_to_the_host() {
        let mut sim = sim_with_pair();
        sim.queue_world_change(WorldChange::AddBuilding {
            name: "Elena's stall".to_owned(),
            kind: "market_stall".to_owned(),
            owner: Some("Elena".to_owned()),
        });
        let for_host = sim.drain_world_changes();
        assert_eq!(for_host.len(), 1);
        assert!(sim.world.building_condition.contains_key("Elena's stall"));
    }

    #[test]
    fn pinning_a_need_sets_priority() {
        let mut sim = sim_with_pair();
        sim.pin_agent_need("Elena", "hunger", 0.95).unwrap();
        let elena = sim.agent("Elena").unwrap();
        assert!((elena.state.need("hunger") - 0.95).abs() < f64::EPSILON);
        assert!(elena.state.priority);
        assert!(elena.state.frozen.is_frozen("needs.hunger"));
        assert!(sim.pin_agent_need("Ghost", "hunger", 0.5).is_err());
    }
}
