//! The cognitive cycle: perceive, react, plan, decide, act, reflect.
//!
//! At each cognitive tick the scheduler draws one to three agents from a
//! shuffled queue (priority-flagged agents jump it) and runs each
//! through the pipeline. A cycle holds exclusive access to its agent by
//! removing it from the collection for the duration of the turn; the
//! only other agent it may touch is a conversation partner, resolved as
//! a disjoint borrow. Community events pre-empt the whole batch.
//!
//! Oracle suspension points: react checks, plan generation, goal
//! proposals, conversation turns, consequence inference, object-state
//! updates, and reflection. Between awaits nothing else mutates the
//! agent; failures degrade to offline paths and never escape the cycle.

use std::collections::{BTreeSet, VecDeque};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use hamlet_agents::Agent;
use hamlet_events::CommunityEvent;
use hamlet_oracle::{GenerateOptions, Oracle, field_bool, field_str};
use hamlet_types::{
    CommunityEventKind, GameTime, MemoryKind, TickEvent, TickEventKind, WorldChange,
};
use hamlet_world::{Motion, TileWorld};

use crate::cadence;
use crate::consequence;
use crate::conversation::ConversationEngine;
use crate::goals::{self, Goal, GoalContext, GoalKind};
use crate::planner;
use crate::sim::Simulation;

/// Observation importance that warrants a react check.
const REACT_IMPORTANCE: f64 = 5.0;

/// Radius within which a dangerous event pre-empts everything else in
/// the decide-and-act ladder.
const URGENT_EVENT_RADIUS: u32 = 15;

/// Speech bubble duration for reaction exclamations.
const SPEECH_BUBBLE_MS: u64 = 2_500;

/// The cognitive-cycle scheduler.
#[derive(Debug, Default)]
pub struct CognitiveCycle {
    queue: VecDeque<String>,
    conversations: ConversationEngine,
}

impl CognitiveCycle {
    /// Create a scheduler with an empty queue.
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            conversations: ConversationEngine::new(),
        }
    }

    /// Pick the agents to process this tick.
    ///
    /// Returns an empty batch while a community event pre-empts
    /// cognition. Batch size adapts to the oracle's failure count and
    /// rate-limit signal; priority-flagged agents jump the queue.
    pub fn select_batch(&mut self, sim: &Simulation, oracle: &Oracle) -> Vec<String> {
        if sim.events.is_preempting() {
            return Vec::new();
        }
        let size = cadence::batch_size(oracle.failure_count(), oracle.is_rate_limited())
            .min(sim.agents.len());

        // Priority agents first, regardless of queue position.
        let mut batch: Vec<String> = sim
            .agents
            .iter()
            .filter(|(_, agent)| agent.state.priority)
            .map(|(name, _)| name.clone())
            .take(size)
            .collect();

        while batch.len() < size {
            if self.queue.is_empty() {
                let mut names: Vec<String> = sim.agents.keys().cloned().collect();
                names.shuffle(&mut rand::rng());
                self.queue.extend(names);
                if self.queue.is_empty() {
                    break;
                }
            }
            if let Some(name) = self.queue.pop_front() {
                if sim.agents.contains_key(&name) && !batch.contains(&name) {
                    batch.push(name);
                }
            } else {
                break;
            }
        }
        batch
    }

    /// Run a full batch through the pipeline.
    pub async fn run_batch(
        &mut self,
        sim: &mut Simulation,
        oracle: &Oracle,
        map: &dyn TileWorld,
        motion: &mut dyn Motion,
    ) {
        let batch = self.select_batch(sim, oracle);
        for name in batch {
            self.run_agent(sim, &name, oracle, map, motion).await;
        }
    }

    /// Run one agent through the full pipeline.
    #[allow(clippy::too_many_lines)]
    pub async fn run_agent(
        &mut self,
        sim: &mut Simulation,
        name: &str,
        oracle: &Oracle,
        map: &dyn TileWorld,
        motion: &mut dyn Motion,
    ) {
        // The cycle owns the agent exclusively for the whole turn.
        let Some(mut agent) = sim.agents.remove(name) else {
            return;
        };
        agent.state.priority = false;
        let now = sim.game_time();

        // 1. Finish-pending-conversation hook.
        if let Some(target_name) = agent.state.pending_conversation.clone() {
            match sim.agents.get(&target_name).map(|t| t.state.pos) {
                Some(pos)
                    if agent.state.pos.distance(pos) <= sim.config.conversation_range =>
                {
                    if let Some(partner) = sim.agents.get_mut(&target_name) {
                        let outcome =
                            self.conversations.run(&mut agent, partner, oracle, now).await;
                        let (record, flows) =
                            outcome.into_record(&agent.state.name, &target_name, now);
                        sim.log.record_conversation(record);
                        for flow in flows {
                            sim.log.record_info_flow(flow);
                        }
                    }
                    sim.agents.insert(name.to_owned(), agent);
                    return;
                }
                Some(_) => {
                    agent.state.follow_target = Some(target_name.clone());
                    motion.start_following(name, &target_name);
                    sim.agents.insert(name.to_owned(), agent);
                    return;
                }
                None => {
                    agent.state.pending_conversation = None;
                    agent.state.follow_target = None;
                }
            }
        }

        // 2. Perceive.
        let top_observation = perceive(&mut agent, sim, map, now);

        // 3. React-or-continue.
        if let Some((observation, importance)) = top_observation
            && importance >= REACT_IMPORTANCE
        {
            self.react_check(&mut agent, oracle, motion, &observation, importance, now)
                .await;
        }

        // 4. Plan upkeep.
        planner::ensure_daily_plan(&mut agent, oracle, now.day).await;
        let hourly_roll: f64 = rand::rng().random();
        if hourly_roll < sim.config.hourly_decompose_probability {
            planner::decompose_hourly(&mut agent, oracle, now).await;
        }
        let detail_roll: f64 = rand::rng().random();
        if detail_roll < sim.config.detail_decompose_probability {
            planner::decompose_detailed(&mut agent, oracle, now).await;
        }

        // 5. Goal selection.
        let ctx = goal_context(sim, now);
        let nearby = nearby_summary(&agent, sim);
        let world = world_summary(sim);
        let mut goal_list = goals::oracle_goals(&agent, oracle, &nearby, &world)
            .await
            .unwrap_or_else(|| goals::algorithmic_goals(&agent, &ctx));
        goals::append_night_sleep(&mut goal_list, &agent, now);
        let top_goal = goals::get_top_goal(&goal_list).cloned();

        // 6. Goal execution.
        let mut executed = false;
        if let Some(goal) = top_goal
            && goal.priority >= goals::EXECUTION_FLOOR
        {
            executed = self
                .execute_goal(sim, &mut agent, &goal, oracle, map, motion, now)
                .await;
        }

        // 7. Decide & act ladder when no goal took over.
        if !executed {
            self.decide_and_act(sim, &mut agent, oracle, map, motion, now).await;
        }

        // 8. Action description from the finest plan level. A detailed
        //    action that references an object marks that object in use.
        if let Some(entry) = agent.plan.finest(now).cloned() {
            agent.state.current_activity = if entry.location == "outdoors" {
                entry.activity.clone()
            } else {
                format!("{} at the {}", entry.activity, entry.location)
            };
            if let (Some(object), Some(building)) =
                (entry.object.as_deref(), agent.state.known_building.as_deref())
            {
                sim.environment
                    .set_object_state(building, object, &format!("in use: {}", entry.activity));
            }
        }

        // 9. Probabilistic object-state update.
        let object_roll: f64 = rand::rng().random();
        if object_roll < sim.config.object_update_probability {
            update_object_states(&mut agent, sim, oracle, now).await;
        }

        // 10. Doorstep environment tracking.
        if let Some(building) = map.building_at(agent.state.pos) {
            agent.state.known_building = Some(building.name.clone());
        } else if let Some(building) = map
            .buildings()
            .iter()
            .find(|b| b.door() == agent.state.pos)
        {
            agent.state.known_building = Some(building.name.clone());
        }

        // 11. Reflection check.
        if agent.reflection.should_reflect(&agent.memory) {
            let hamlet_agents::Agent {
                reflection,
                memory,
                state,
                ..
            } = &mut agent;
            reflection.reflect(&state.name, memory, oracle, now).await;
        }

        // 12. Embedding drain: at most one batch.
        agent.memory.process_embeddings(oracle).await;

        sim.agents.insert(name.to_owned(), agent);
    }

    /// Ask the oracle whether the agent should react to an observation.
    async fn react_check(
        &mut self,
        agent: &mut Agent,
        oracle: &Oracle,
        motion: &mut dyn Motion,
        observation: &str,
        importance: f64,
        now: GameTime,
    ) {
        if !oracle.has_any_key() {
            return;
        }
        let ctx = serde_json::json!({
            "agent_name": agent.state.name,
            "personality": agent.state.personality,
            "observation": observation,
            "importance": importance,
            "current_activity": agent.state.current_activity,
        });
        let Ok(prompt) = oracle.prompts().render("react", &ctx) else {
            return;
        };
        let Ok(value) = oracle.generate_json(&prompt, GenerateOptions::default()).await else {
            return;
        };

        if field_bool(&value, "react") != Some(true) {
            return;
        }
        if let Some(activity) = field_str(&value, "new_activity")
            && !activity.is_empty()
        {
            agent.state.current_activity = activity;
        }
        if let Some(speech) = field_str(&value, "speech")
            && !speech.is_empty()
        {
            motion.say(&agent.state.name, &speech, SPEECH_BUBBLE_MS);
        }
        let reasoning = field_str(&value, "reasoning")
            .unwrap_or_else(|| format!("decided to act on: {observation}"));
        agent
            .memory
            .add(reasoning, MemoryKind::Observation, 5.0, now);

        if field_bool(&value, "should_replan") == Some(true) {
            planner::replan_after_reaction(agent, oracle, now).await;
            debug!(agent = %agent.state.name, "plan regenerated after reaction");
        }
    }

    /// Execute the selected goal. Returns whether anything happened.
    #[allow(clippy::too_many_arguments)]
    async fn execute_goal(
        &mut self,
        sim: &mut Simulation,
        agent: &mut Agent,
        goal: &Goal,
        oracle: &Oracle,
        map: &dyn TileWorld,
        motion: &mut dyn Motion,
        now: GameTime,
    ) -> bool {
        debug!(agent = %agent.state.name, goal = %goal.description, "executing goal");
        match goal.kind {
            GoalKind::SeekPerson => {
                let Some(target_name) = goal.target.clone() else {
                    return false;
                };
                let Some(target_pos) = sim.agents.get(&target_name).map(|t| t.state.pos) else {
                    return false;
                };
                if agent.state.pos.distance(target_pos) <= sim.config.conversation_range {
                    if let Some(partner) = sim.agents.get_mut(&target_name) {
                        let outcome =
                            self.conversations.run(agent, partner, oracle, now).await;
                        let (record, flows) =
                            outcome.into_record(&agent.state.name, &target_name, now);
                        sim.log.record_conversation(record);
                        for flow in flows {
                            sim.log.record_info_flow(flow);
                        }
                        // Romance goals follow the talk with the flirt
                        // consequence.
                        if goal.action.as_deref() == Some("flirt") {
                            let outcome = consequence::apply_action(
                                "flirt",
                                agent,
                                Some(partner),
                                &mut sim.world,
                                sim.world_def.as_ref(),
                                now,
                            );
                            for change in outcome.world_changes {
                                sim.queue_world_change(change);
                            }
                        }
                    }
                } else {
                    agent.state.pending_conversation = Some(target_name.clone());
                    agent.state.follow_target = Some(target_name.clone());
                    motion.start_following(&agent.state.name, &target_name);
                }
                true
            }
            GoalKind::StayHere => {
                if let Some(action) = goal.action.as_deref() {
                    let outcome = consequence::apply_action(
                        action,
                        agent,
                        None,
                        &mut sim.world,
                        sim.world_def.as_ref(),
                        now,
                    );
                    for change in outcome.world_changes {
                        sim.queue_world_change(change);
                    }
                    for line in outcome.changes {
                        debug!(agent = %agent.state.name, "{line}");
                    }
                    true
                } else {
                    self.free_form_consequence(sim, agent, goal, oracle, now).await
                }
            }
            GoalKind::GoToBuilding => {
                let target = goal
                    .target
                    .clone()
                    .or_else(|| workplace_for(&agent.state.occupation));
                let Some(target) = target else {
                    return false;
                };
                let Some(building) = map.building_by_name_fuzzy(&target) else {
                    debug!(agent = %agent.state.name, building = %target, "no such building");
                    return false;
                };
                if agent.state.known_building.as_deref() == Some(building.name.as_str()) {
                    let action = goal.action.as_deref().unwrap_or("work");
                    let outcome = consequence::apply_action(
                        action,
                        agent,
                        None,
                        &mut sim.world,
                        sim.world_def.as_ref(),
                        now,
                    );
                    for change in outcome.world_changes {
                        sim.queue_world_change(change);
                    }
                } else {
                    motion.go_to_building(&agent.state.name, &building.name);
                }
                true
            }
            GoalKind::CallEvent => {
                self.call_event(sim, agent, goal, oracle, now).await;
                true
            }
            GoalKind::Wander => {
                let target = map.random_walkable(agent.state.pos, 8);
                motion.walk_to(&agent.state.name, target.x, target.y);
                true
            }
        }
    }

    /// Oracle-inferred consequence for a free-form goal description.
    async fn free_form_consequence(
        &mut self,
        sim: &mut Simulation,
        agent: &mut Agent,
        goal: &Goal,
        oracle: &Oracle,
        now: GameTime,
    ) -> bool {
        if !oracle.has_any_key() {
            return false;
        }
        let ctx = serde_json::json!({
            "agent_name": agent.state.name,
            "action_description": goal.description,
            "target_name": goal.target,
            "world_summary": world_summary(sim),
        });
        let Ok(prompt) = oracle.prompts().render("consequence", &ctx) else {
            return false;
        };
        let Ok(value) = oracle.generate_json(&prompt, GenerateOptions::default()).await else {
            return false;
        };

        let target_name = goal.target.clone();
        let outcome = match target_name.as_deref().and_then(|t| sim.agents.get_mut(t)) {
            Some(partner) => consequence::apply_llm_consequence(
                &value,
                agent,
                Some(partner),
                &mut sim.world,
            ),
            None => consequence::apply_llm_consequence(&value, agent, None, &mut sim.world),
        };
        for change in outcome.world_changes {
            sim.queue_world_change(change);
        }
        agent.memory.add(
            outcome
                .changes
                .first()
                .cloned()
                .unwrap_or_else(|| goal.description.clone()),
            MemoryKind::Event,
            4.0,
            now,
        );
        true
    }

    /// Start a community event from a goal, with oracle-generated phases
    /// for dynamic kinds.
    async fn call_event(
        &mut self,
        sim: &mut Simulation,
        agent: &mut Agent,
        goal: &Goal,
        oracle: &Oracle,
        now: GameTime,
    ) {
        agent.state.last_event_called = Some(now);
        let kind_tag = goal.details.clone().unwrap_or_else(|| "gathering".to_owned());
        let kind = CommunityEventKind::parse(&kind_tag);

        if let CommunityEventKind::Dynamic(_) = &kind
            && oracle.has_any_key()
        {
            let ctx = serde_json::json!({
                "event_kind": kind.label(),
                "details": goal.details,
                "caller": agent.state.name,
            });
            if let Ok(prompt) = oracle.prompts().render("event_phases", &ctx)
                && let Ok(value) = oracle.generate_json(&prompt, GenerateOptions::default()).await
            {
                let phases = parse_event_phases(&value);
                info!(kind = kind.label(), caller = %agent.state.name, "dynamic event called");
                sim.events.start(
                    CommunityEvent::with_phases(
                        kind,
                        &agent.state.name,
                        goal.details.clone(),
                        phases,
                    )
                    .with_venue(agent.state.pos),
                );
                return;
            }
        }
        sim.queue_world_change(WorldChange::StartCommunityEvent {
            kind: kind_tag,
            details: goal.details.clone(),
            caller: agent.state.name.clone(),
        });
    }

    /// The decide-and-act ladder when no goal fired, highest rung first:
    /// flee an urgent nearby event, continue an in-progress pursuit,
    /// converse if someone is close and the dice agree, follow the plan,
    /// wander.
    async fn decide_and_act(
        &mut self,
        sim: &mut Simulation,
        agent: &mut Agent,
        oracle: &Oracle,
        map: &dyn TileWorld,
        motion: &mut dyn Motion,
        now: GameTime,
    ) {
        // Urgent-event rung: a dangerous event close enough to matter
        // overrides everything, including an active pursuit.
        let threat: Option<String> = sim
            .events
            .active()
            .iter()
            .find(|event| {
                event.kind.is_dangerous()
                    && event.venue.is_some_and(|venue| {
                        agent.state.pos.distance(venue) <= URGENT_EVENT_RADIUS
                    })
            })
            .map(|event| event.kind.label().to_owned());
        if let Some(threat) = threat {
            agent.state.follow_target = None;
            agent.state.pending_conversation = None;
            motion.flee_from(&agent.state.name, &threat);
            return;
        }

        // Following-continuation rung: keep an in-progress pursuit going
        // before rolling dice on anything new.
        if let Some(target_name) = agent.state.follow_target.clone() {
            if sim.agents.contains_key(&target_name) {
                motion.start_following(&agent.state.name, &target_name);
                return;
            }
            agent.state.follow_target = None;
        }

        // Conversation rung.
        let nearest: Option<String> = sim
            .agents
            .iter()
            .filter(|(_, other)| {
                other.state.mode != hamlet_agents::AgentMode::Talking
                    && agent.state.pos.distance(other.state.pos)
                        <= sim.config.conversation_range
            })
            .min_by_key(|(_, other)| agent.state.pos.distance(other.state.pos))
            .map(|(name, _)| name.clone());
        if let Some(partner_name) = nearest
            && self.conversations.should_converse(agent, &partner_name)
        {
            if let Some(partner) = sim.agents.get_mut(&partner_name) {
                let outcome = self.conversations.run(agent, partner, oracle, now).await;
                let (record, flows) =
                    outcome.into_record(&agent.state.name, &partner_name, now);
                sim.log.record_conversation(record);
                for flow in flows {
                    sim.log.record_info_flow(flow);
                }
            }
            return;
        }

        // Plan-follow rung.
        if let Some(entry) = agent.plan.finest(now).cloned() {
            if entry.location != "outdoors"
                && agent.state.known_building.as_deref() != Some(entry.location.as_str())
                && map.building_by_name_fuzzy(&entry.location).is_some()
            {
                motion.go_to_building(&agent.state.name, &entry.location);
            }
            return;
        }

        // Wander rung.
        let target = map.random_walkable(agent.state.pos, 6);
        motion.walk_to(&agent.state.name, target.x, target.y);
    }
}

// ---------------------------------------------------------------------------
// Event routing
// ---------------------------------------------------------------------------

/// Route ticker events into agent cognition.
///
/// Awareness events become memories (and hot topics when weighty);
/// impulse events either auto-apply (food purchases) or leave a nudge
/// memory that the goal ladder picks up next cycle.
pub fn route_events(sim: &mut Simulation) {
    while let Some(event) = sim.pending_events.pop_front() {
        let now = sim.game_time();
        match event.kind {
            TickEventKind::Awareness | TickEventKind::WorldAwareness => {
                route_awareness(sim, &event, now);
            }
            TickEventKind::BuyFood => {
                if let Some(mut agent) = sim.agents.remove(&event.agent) {
                    let outcome = consequence::apply_action(
                        "buy_food",
                        &mut agent,
                        None,
                        &mut sim.world,
                        sim.world_def.as_ref(),
                        now,
                    );
                    for change in outcome.world_changes {
                        sim.queue_world_change(change);
                    }
                    sim.agents.insert(event.agent.clone(), agent);
                }
            }
            TickEventKind::SeekCompany => {
                nudge(sim, &event.agent, "I should find some company soon", 4.0, now);
            }
            TickEventKind::SeekRomance => {
                nudge(sim, &event.agent, "My heart aches for companionship", 4.0, now);
            }
            TickEventKind::SeekLeadership => {
                nudge(
                    sim,
                    &event.agent,
                    "The village needs direction; perhaps I could lead",
                    5.0,
                    now,
                );
            }
        }
    }
}

/// Write an awareness event into the agent's memory (and hot topics
/// when it is newsworthy enough to gossip about).
fn route_awareness(sim: &mut Simulation, event: &TickEvent, now: GameTime) {
    let Some(text) = event.text.clone() else {
        return;
    };
    let importance = f64::from(event.importance.unwrap_or(5));
    let kind = if event.kind == TickEventKind::WorldAwareness {
        MemoryKind::Event
    } else {
        MemoryKind::Observation
    };
    if let Some(agent) = sim.agents.get_mut(&event.agent) {
        agent.memory.add(text.clone(), kind, importance, now);
        if event.kind == TickEventKind::WorldAwareness && importance >= 7.0 {
            agent.state.knowledge.add_hot_topic(&text, importance, now);
        }
    }
}

/// Drop a nudge memory for the goal ladder.
fn nudge(sim: &mut Simulation, agent_name: &str, text: &str, importance: f64, now: GameTime) {
    if let Some(agent) = sim.agents.get_mut(agent_name) {
        agent
            .memory
            .add(text.to_owned(), MemoryKind::Observation, importance, now);
    }
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

/// Enumerate nearby agents, buildings, and active events; write
/// observation memories for anything newly seen; return the most
/// important new observation for the react check.
fn perceive(
    agent: &mut Agent,
    sim: &Simulation,
    map: &dyn TileWorld,
    now: GameTime,
) -> Option<(String, f64)> {
    let mut top: Option<(String, f64)> = None;
    let mut consider = |text: String, importance: f64, memory: &mut Agent| {
        memory
            .memory
            .add(text.clone(), MemoryKind::Observation, importance, now);
        if top.as_ref().is_none_or(|(_, best)| importance > *best) {
            top = Some((text, importance));
        }
    };

    // Nearby agents (radius 10 by default).
    let nearby: Vec<(String, bool)> = sim
        .agents
        .iter()
        .filter(|(_, other)| {
            agent.state.pos.distance(other.state.pos) <= sim.config.perceive_agent_radius
        })
        .map(|(name, _)| (name.clone(), agent.state.relationship(name).is_some()))
        .collect();
    for (name, familiar) in nearby {
        if agent.state.seen_agents.insert(name.clone()) {
            let importance = if familiar { 3.0 } else { 4.0 };
            consider(format!("noticed {name} nearby"), importance, agent);
        }
    }

    // Nearby buildings (radius 12 by default).
    let buildings: Vec<String> = map
        .buildings()
        .iter()
        .filter(|b| b.distance_from(agent.state.pos) <= sim.config.perceive_building_radius)
        .map(|b| b.name.clone())
        .collect();
    for name in buildings {
        if agent.state.seen_buildings.insert(name.clone()) {
            consider(format!("passed the {name}"), 3.0, agent);
        }
    }

    // Active community events (dangerous ones weigh more).
    let events: Vec<(String, String, bool)> = sim
        .events
        .active()
        .iter()
        .map(|e| (e.id.to_string(), e.kind.label().to_owned(), e.kind.is_dangerous()))
        .collect();
    for (id, label, dangerous) in events {
        let seen_key = format!("event:{id}");
        if agent.state.seen_buildings.insert(seen_key) {
            let importance = if dangerous { 9.0 } else { 5.0 };
            consider(format!("a {label} is underway"), importance, agent);
        }
    }

    top
}

// ---------------------------------------------------------------------------
// Context builders
// ---------------------------------------------------------------------------

/// Build the ladder's world context from the simulation.
fn goal_context(sim: &Simulation, now: GameTime) -> GoalContext {
    let unpartnered: BTreeSet<String> = sim
        .agents
        .iter()
        .filter(|(_, a)| a.state.partner.is_none())
        .map(|(name, _)| name.clone())
        .collect();
    GoalContext {
        leader: sim.world.governance.leader.clone(),
        unrest: sim.world.governance.unrest,
        prosperity: sim.world.economy.prosperity,
        stall_price: sim.price("market_stall"),
        tool_price: sim.price("tool"),
        unpartnered,
        now,
    }
}

/// One-line summary of who is near the agent, for prompts.
fn nearby_summary(agent: &Agent, sim: &Simulation) -> String {
    let names: Vec<&str> = sim
        .agents
        .iter()
        .filter(|(_, other)| {
            agent.state.pos.distance(other.state.pos) <= sim.config.perceive_agent_radius
        })
        .map(|(name, _)| name.as_str())
        .collect();
    if names.is_empty() {
        "nobody nearby".to_owned()
    } else {
        names.join(", ")
    }
}

/// One-line world summary for prompts.
fn world_summary(sim: &Simulation) -> String {
    format!(
        "day {}, {} ({:?}); food {:.0}, prosperity {:.0}, unrest {:.0}, leader: {}",
        sim.world.day,
        sim.world.environment.season,
        sim.world.environment.weather,
        sim.world.resource("food"),
        sim.world.economy.prosperity,
        sim.world.governance.unrest,
        sim.world.governance.leader.as_deref().unwrap_or("none"),
    )
}

/// Workplace building for an agent's occupation, mirroring the default
/// plan's mapping.
fn workplace_for(occupation: &Option<String>) -> Option<String> {
    occupation.as_deref().map(|o| {
        match o {
            "farmer" => "farm",
            "baker" => "bakery",
            "merchant" => "market",
            "scholar" | "scientist" | "scribe" => "library",
            "healer" => "clinic",
            "blacksmith" => "forge",
            _ => "market",
        }
        .to_owned()
    })
}

/// Ask the oracle which objects changed state and update the tree.
async fn update_object_states(
    agent: &mut Agent,
    sim: &mut Simulation,
    oracle: &Oracle,
    now: GameTime,
) {
    let Some(building) = agent.state.known_building.clone() else {
        return;
    };
    if !oracle.has_any_key() {
        return;
    }
    let ctx = serde_json::json!({
        "agent_name": agent.state.name,
        "current_activity": agent.state.current_activity,
        "building_name": building,
        "objects_summary": sim.environment.summary(&building),
    });
    let Ok(prompt) = oracle.prompts().render("object_states", &ctx) else {
        return;
    };
    let Ok(value) = oracle.generate_json(&prompt, GenerateOptions::default()).await else {
        return;
    };
    let Some(changes) = value.get("changes").and_then(|c| c.as_array()) else {
        return;
    };
    for change in changes {
        if let (Some(object), Some(state)) =
            (field_str(change, "object"), field_str(change, "state"))
        {
            sim.environment.set_object_state(&building, &object, &state);
            agent.memory.add(
                format!("the {object} in the {building} is now {state}"),
                MemoryKind::Observation,
                2.0,
                now,
            );
        }
    }
}

/// Parse `{"phases": [...]}` into event phases; bad rows are dropped.
fn parse_event_phases(value: &serde_json::Value) -> Vec<hamlet_events::EventPhase> {
    value
        .get("phases")
        .and_then(|p| p.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let id = field_str(row, "id")?;
                    let label = field_str(row, "label").unwrap_or_else(|| id.clone());
                    let duration = hamlet_oracle::field_f64(row, "duration_ms")
                        .unwrap_or(20_000.0)
                        .clamp(1_000.0, 600_000.0);
                    Some(hamlet_events::EventPhase {
                        id,
                        label,
                        duration_ms: u64::try_from(duration as i64).unwrap_or(20_000),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use hamlet_oracle::Backend;
    use hamlet_types::TilePos;
    use hamlet_world::{GridWorld, RecordedMotion};

    fn sim() -> Simulation {
        let mut sim = Simulation::new(SimConfig::default(), None);
        sim.add_character("Elena", "a quiet baker", Some("baker".to_owned()), 29, TilePos::new(5, 5))
            .unwrap();
        sim.add_character(
            "Bram",
            "an outgoing, friendly farmer",
            Some("farmer".to_owned()),
            33,
            TilePos::new(6, 5),
        )
        .unwrap();
        sim
    }

    fn offline_oracle() -> Oracle {
        Oracle::with_backend(Backend::Offline).unwrap()
    }

    #[test]
    fn preemption_empties_the_batch() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        let oracle = offline_oracle();
        assert!(!cycle.select_batch(&s, &oracle).is_empty());
        s.events.start(CommunityEvent::new(
            CommunityEventKind::Festival,
            "user",
            None,
        ));
        assert!(cycle.select_batch(&s, &oracle).is_empty());
        s.events.stop_all();
        assert_eq!(cycle.select_batch(&s, &oracle).len(), 2);
    }

    #[test]
    fn priority_agents_jump_the_queue() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        let oracle = offline_oracle();
        s.agent_mut("Bram").unwrap().state.priority = true;
        let batch = cycle.select_batch(&s, &oracle);
        assert_eq!(batch.first().map(String::as_str), Some("Bram"));
    }

    #[tokio::test]
    async fn offline_cycle_runs_the_full_pipeline() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        let oracle = offline_oracle();
        let map = GridWorld::new(50, 50);
        let mut motion = RecordedMotion::new();

        cycle.run_agent(&mut s, "Elena", &oracle, &map, &mut motion).await;

        let elena = s.agent("Elena").unwrap();
        // Perception noticed Bram; plan fell back to the default day.
        assert!(elena.state.seen_agents.contains("Bram"));
        assert!(!elena.plan.is_daily_stale(1));
        assert!(!elena.state.current_activity.is_empty());
    }

    #[tokio::test]
    async fn dangerous_event_nearby_makes_the_agent_flee() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        // Nothing on the goal ladder clears the floor with empty pockets.
        s.agent_mut("Elena").unwrap().state.set_status("wealth", 0.0);
        s.events.start(
            CommunityEvent::new(CommunityEventKind::Protest, "Bram", None)
                .with_venue(TilePos::new(10, 5)),
        );
        let oracle = offline_oracle();
        let map = GridWorld::new(50, 50);
        let mut motion = RecordedMotion::new();

        cycle.run_agent(&mut s, "Elena", &oracle, &map, &mut motion).await;

        assert!(motion.commands().iter().any(|c| matches!(
            c,
            hamlet_world::MotionCommand::FleeFrom { agent, threat }
                if agent == "Elena" && threat == "protest"
        )));
    }

    #[tokio::test]
    async fn distant_dangerous_event_does_not_trigger_flight() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        s.agent_mut("Elena").unwrap().state.set_status("wealth", 0.0);
        // Sixteen tiles away: one past the urgent radius.
        s.events.start(
            CommunityEvent::new(CommunityEventKind::Protest, "Bram", None)
                .with_venue(TilePos::new(21, 5)),
        );
        let oracle = offline_oracle();
        let map = GridWorld::new(50, 50);
        let mut motion = RecordedMotion::new();

        cycle.run_agent(&mut s, "Elena", &oracle, &map, &mut motion).await;

        assert!(!motion.commands().iter().any(|c| matches!(
            c,
            hamlet_world::MotionCommand::FleeFrom { .. }
        )));
    }

    #[tokio::test]
    async fn follow_continuation_outranks_new_conversations() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        {
            let elena = s.agent_mut("Elena").unwrap();
            elena.state.set_status("wealth", 0.0);
            elena.state.follow_target = Some("Bram".to_owned());
        }
        let oracle = offline_oracle();
        let map = GridWorld::new(50, 50);
        let mut motion = RecordedMotion::new();

        cycle.run_agent(&mut s, "Elena", &oracle, &map, &mut motion).await;

        assert!(motion.commands().iter().any(|c| matches!(
            c,
            hamlet_world::MotionCommand::StartFollowing { agent, target }
                if agent == "Elena" && target == "Bram"
        )));
        assert_eq!(
            s.agent("Elena").unwrap().state.follow_target.as_deref(),
            Some("Bram")
        );
    }

    #[tokio::test]
    async fn stale_follow_targets_are_dropped() {
        let mut cycle = CognitiveCycle::new();
        let mut s = sim();
        {
            let elena = s.agent_mut("Elena").unwrap();
            elena.state.set_status("wealth", 0.0);
            elena.state.follow_target = Some("Ghost".to_owned());
        }
        let oracle = offline_oracle();
        let map = GridWorld::new(50, 50);
        let mut motion = RecordedMotion::new();

        cycle.run_agent(&mut s, "Elena", &oracle, &map, &mut motion).await;

        assert!(s.agent("Elena").unwrap().state.follow_target.is_none());
    }

    #[tokio::test]
    async fn buy_food_event_routes_to_a_purchase() {
        let mut s = sim();
        s.world.resources.insert("food".to_owned(), 50.0);
        s.pending_events.push_back(TickEvent::impulse(
            TickEventKind::BuyFood,
            "Elena".to_owned(),
        ));
        route_events(&mut s);
        let elena = s.agent("Elena").unwrap();
        assert_eq!(elena.state.inventory.quantity_of_kind("food"), 1);
        assert!(elena.state.wealth() < 50.0);
    }

    #[tokio::test]
    async fn awareness_routes_into_memory_and_hot_topics() {
        let mut s = sim();
        s.pending_events.push_back(TickEvent::world_awareness(
            "Elena".to_owned(),
            "Food stores are running dangerously low".to_owned(),
            8,
        ));
        route_events(&mut s);
        let elena = s.agent("Elena").unwrap();
        assert!(elena
            .memory
            .entries()
            .iter()
            .any(|e| e.description.contains("dangerously low")));
        assert!(!elena.state.knowledge.topics().is_empty());
    }
}
