//! The consequence engine: translating actions into bounded state deltas.
//!
//! Three execution paths, every one of them clamped:
//!
//! - **Schema-driven** (`apply_generic_action`): resolves an action id in
//!   the world definition, checks prerequisites, consumes inputs,
//!   applies effects, produces outputs, applies dotted-path world
//!   effects, and handles social touches and agent-to-agent trade.
//! - **Built-in ladder** (`apply_builtin`): the hard-coded consequence
//!   table used when no definition matches. Deltas here are the
//!   regression contract; tests pin them exactly.
//! - **Oracle-driven** (`apply_llm_consequence`): free-form JSON from
//!   the oracle, validated field by field. Invalid keys are dropped
//!   silently, every delta is hard-clamped, and an unparseable response
//!   falls back to the built-in `socialize` consequence.
//!
//! Invariants enforced on every path: needs in [0,1], status in [0,100]
//! (wealth bounded, never negative), skills in [0,10], relationship
//! dimensions in [0,1] with symmetric dimensions mirrored, inventory
//! capped, and overdrawing transactions rejected.

use serde_json::Value;
use tracing::{debug, warn};

use hamlet_agents::{Agent, AgentError, DirectedDelta, RelationshipEdit, apply_pair};
use hamlet_types::{GameTime, Transaction, WorldChange, WorldDef};
use hamlet_world::WorldState;

// ---------------------------------------------------------------------------
// Oracle-path clamps
// ---------------------------------------------------------------------------

/// Maximum absolute need delta per oracle event.
const CLAMP_NEED: f64 = 0.5;
/// Maximum absolute status delta per oracle event.
const CLAMP_STATUS: f64 = 25.0;
/// Maximum absolute relationship-dimension delta per oracle event.
const CLAMP_RELATIONSHIP: f64 = 0.4;
/// Maximum absolute world-field delta per oracle event.
const CLAMP_WORLD: f64 = 15.0;

// ---------------------------------------------------------------------------
// Partnership thresholds (flirt)
// ---------------------------------------------------------------------------

/// Actor-to-target attraction required for partnership.
const PARTNER_ATTRACTION_FORWARD: f64 = 0.75;
/// Target-to-actor attraction required for partnership.
const PARTNER_ATTRACTION_REVERSE: f64 = 0.6;
/// Actor-to-target trust required for partnership.
const PARTNER_TRUST: f64 = 0.6;

/// The result of one consequence application.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Human-readable audit trail.
    pub changes: Vec<String>,
    /// Deferred structural operations for the host.
    pub world_changes: Vec<WorldChange>,
    /// Monetary deltas recorded, `(agent, transaction)`.
    pub transactions: Vec<(String, Transaction)>,
}

impl Outcome {
    fn note(&mut self, change: impl Into<String>) {
        self.changes.push(change.into());
    }

    fn spend(
        &mut self,
        agent: &mut Agent,
        amount: f64,
        reason: &str,
        time: GameTime,
    ) -> Result<(), AgentError> {
        agent.state.spend(amount, reason, time)?;
        self.transactions.push((
            agent.state.name.clone(),
            Transaction {
                amount: -amount,
                reason: reason.to_owned(),
                game_time: time,
            },
        ));
        Ok(())
    }

    fn earn(&mut self, agent: &mut Agent, amount: f64, reason: &str, time: GameTime) {
        agent.state.earn(amount, reason, time);
        self.transactions.push((
            agent.state.name.clone(),
            Transaction {
                amount,
                reason: reason.to_owned(),
                game_time: time,
            },
        ));
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply an action by id: the world definition first, then the built-in
/// ladder, finally the `socialize` consequence as the unknown-action
/// fallback.
pub fn apply_action(
    action_id: &str,
    actor: &mut Agent,
    target: Option<&mut Agent>,
    world: &mut WorldState,
    def: Option<&WorldDef>,
    time: GameTime,
) -> Outcome {
    if let Some(def) = def
        && def.action(action_id).is_some()
    {
        return match apply_generic_action(action_id, actor, target, world, def, time) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!(action = action_id, agent = %actor.state.name, error = %err, "action rejected");
                let mut outcome = Outcome::default();
                outcome.note(format!("{} could not {action_id}: {err}", actor.state.name));
                outcome
            }
        };
    }
    match apply_builtin(action_id, actor, target, world, time) {
        Some(outcome) => outcome,
        None => {
            warn!(action = action_id, "unknown action; treating as socialize");
            let mut outcome = Outcome::default();
            builtin_socialize(&mut outcome, actor, None);
            outcome
        }
    }
}

// ---------------------------------------------------------------------------
// Schema-driven path
// ---------------------------------------------------------------------------

/// Apply a world-definition action.
///
/// # Errors
///
/// Returns [`AgentError`] when a canonical prerequisite fails (missing
/// action, wrong location, missing inputs, insufficient funds). The
/// state is untouched on failure: prerequisites are checked before any
/// mutation.
pub fn apply_generic_action(
    action_id: &str,
    actor: &mut Agent,
    mut target: Option<&mut Agent>,
    world: &mut WorldState,
    def: &WorldDef,
    time: GameTime,
) -> Result<Outcome, AgentError> {
    let action = def
        .action(action_id)
        .ok_or_else(|| AgentError::UnknownAction {
            action: action_id.to_owned(),
        })?
        .clone();
    let mut outcome = Outcome::default();
    let actor_name = actor.state.name.clone();

    // 1. Prerequisites before any mutation.
    if let Some(required) = &action.location
        && actor.state.known_building.as_deref() != Some(required.as_str())
    {
        return Err(AgentError::WrongLocation {
            agent: actor_name,
            location: required.clone(),
        });
    }
    for input in &action.inputs {
        if input.resource == "currency" {
            if actor.state.wealth() < input.amount {
                return Err(AgentError::InsufficientFunds {
                    agent: actor_name,
                    amount: input.amount,
                    wealth: actor.state.wealth(),
                });
            }
        } else {
            let held = f64::from(actor.state.inventory.quantity_of(&input.resource));
            let in_world = world.resource(&input.resource);
            if held + in_world < input.amount {
                return Err(AgentError::MissingResource {
                    agent: actor_name,
                    resource: input.resource.clone(),
                    amount: input.amount - held - in_world,
                });
            }
        }
    }

    // 2. Consume inputs.
    for input in &action.inputs {
        if input.resource == "currency" {
            outcome.spend(actor, input.amount, action_id, time)?;
        } else {
            let want = input.amount.ceil().max(0.0);
            let want_units = u32::try_from(want as i64).unwrap_or(0);
            let taken = actor.state.inventory.remove(&input.resource, want_units);
            let shortfall = f64::from(want_units.saturating_sub(taken));
            if shortfall > 0.0 {
                world.add_resource(&input.resource, -shortfall);
            }
            outcome.note(format!(
                "{} used {want} {}",
                actor.state.name, input.resource
            ));
        }
    }

    // 3. Effects on the performer, all clamped by the state helpers.
    for (need, delta) in &action.effects.needs {
        actor.state.add_need(need, *delta);
    }
    for (status, delta) in &action.effects.status {
        actor.state.add_status(status, *delta);
    }
    for (skill, delta) in &action.effects.skills {
        actor.state.add_skill(skill, *delta);
    }
    if !action.effects.is_noop() {
        outcome.note(format!("{} felt the effects of {action_id}", actor.state.name));
    }

    // 4. Outputs into the inventory.
    for output in &action.outputs {
        let units = u32::try_from(output.amount.round().max(0.0) as i64).unwrap_or(0);
        let added = actor
            .state
            .inventory
            .add(&output.resource, &output.resource, units);
        if added > 0 {
            outcome.note(format!("{} gained {added} {}", actor.state.name, output.resource));
        }
    }

    // 5. World effects on dotted paths, clamped non-negative by the
    //    world's own helpers. Unknown paths are dropped with a log line.
    for (path, delta) in &action.world_effects {
        if world.frozen.is_frozen(path) {
            continue;
        }
        if world.apply_path_delta(path, *delta).is_err() {
            warn!(path = %path, "dropping world effect on unknown field");
        }
    }

    // 6. Social touch.
    if action.social
        && let Some(partner) = target.as_deref_mut()
    {
        touch_pair(actor, partner, RelationshipEdit::touch(0.03));
        outcome.note(format!(
            "{} and {} grew a little more familiar",
            actor.state.name, partner.state.name
        ));
    }

    // 7. Agent-to-agent trade with monetary settlement.
    if action_id == "trade"
        && !action.needed_resources.is_empty()
        && let Some(partner) = target.as_deref_mut()
    {
        trade_with(&mut outcome, &action, actor, partner, def, time);
    }

    // 8. Practice: work or any located action grows the primary skill.
    if action_id == "work" || action.location.is_some() {
        let primary = actor
            .state
            .occupation
            .as_deref()
            .and_then(|occupation| def.occupation(occupation))
            .map(|o| o.primary_skill.clone());
        if let Some(skill) = primary {
            actor.state.add_skill(&skill, 0.02);
        }
    }

    Ok(outcome)
}

/// Transfer each needed resource from the target, settling at the
/// definition's price.
fn trade_with(
    outcome: &mut Outcome,
    action: &hamlet_types::ActionDef,
    actor: &mut Agent,
    partner: &mut Agent,
    def: &WorldDef,
    time: GameTime,
) {
    for needed in &action.needed_resources {
        let units = u32::try_from(needed.amount.round().max(0.0) as i64).unwrap_or(0);
        let available = partner.state.inventory.quantity_of(&needed.resource);
        let qty = units.min(available);
        if qty == 0 {
            continue;
        }
        let price = def.price(&needed.resource) * f64::from(qty);
        if outcome.spend(actor, price, "trade", time).is_err() {
            continue;
        }
        partner.state.inventory.remove(&needed.resource, qty);
        actor
            .state
            .inventory
            .add(&needed.resource, &needed.resource, qty);
        outcome.earn(partner, price, "trade", time);
        outcome.note(format!(
            "{} bought {qty} {} from {}",
            actor.state.name, needed.resource, partner.state.name
        ));
    }
}

// ---------------------------------------------------------------------------
// Built-in consequence ladder
// ---------------------------------------------------------------------------

/// Apply a built-in action. Returns `None` for unknown ids.
///
/// The numeric deltas here are the deterministic regression contract.
#[allow(clippy::too_many_lines)]
pub fn apply_builtin(
    action_id: &str,
    actor: &mut Agent,
    mut target: Option<&mut Agent>,
    world: &mut WorldState,
    time: GameTime,
) -> Option<Outcome> {
    let mut outcome = Outcome::default();
    match action_id {
        "eat" => {
            if actor.state.inventory.remove_kind("food", 1) == 1 {
                outcome.note(format!("{} ate from their satchel", actor.state.name));
            } else {
                let price = world.price("food");
                if outcome.spend(actor, price, "eat", time).is_err() {
                    outcome.note(format!("{} cannot afford a meal", actor.state.name));
                    return Some(outcome);
                }
                world.add_resource("food", -1.0);
                outcome.note(format!("{} bought and ate a meal", actor.state.name));
            }
            actor.state.add_need("hunger", -0.7);
            actor.state.add_status("energy", 5.0);
        }
        "buy_food" => {
            let price = world.price("food");
            if outcome.spend(actor, price, "buy_food", time).is_err() {
                return Some(outcome);
            }
            world.add_resource("food", -1.0);
            actor.state.inventory.add("bread", "food", 1);
            outcome.note(format!("{} bought bread", actor.state.name));
        }
        "buy_item" => {
            let price = world.price("tool");
            if outcome.spend(actor, price, "buy_item", time).is_err() {
                return Some(outcome);
            }
            actor.state.inventory.add("tool", "tool", 1);
            outcome.note(format!("{} bought a tool", actor.state.name));
        }
        "sell_item" => {
            let qty = actor.state.inventory.quantity_of_kind("food").min(3);
            if qty == 0 {
                return Some(outcome);
            }
            actor.state.inventory.remove_kind("food", qty);
            let price = world.price("food") * 0.8 * f64::from(qty);
            outcome.earn(actor, price, "sell_item", time);
            outcome.note(format!("{} sold {qty} food at the market", actor.state.name));
        }
        "sleep" => {
            actor.state.add_need("rest", -0.9);
            actor.state.add_status("energy", 30.0);
            actor.state.add_status("happiness", 2.0);
            outcome.note(format!("{} slept soundly", actor.state.name));
        }
        "socialize" => {
            builtin_socialize(&mut outcome, actor, target.as_deref_mut());
        }
        "work" => {
            actor.state.add_need("purpose", -0.4);
            actor.state.add_status("energy", -10.0);
            outcome.earn(actor, 5.0, "wage", time);
            outcome.note(format!("{} put in a day's work", actor.state.name));
        }
        "flirt" => {
            let partner = target.as_deref_mut()?;
            builtin_flirt(&mut outcome, actor, partner);
        }
        "give_gift" => {
            let partner = target.as_deref_mut()?;
            let price = world.price("gift");
            if outcome.spend(actor, price, "give_gift", time).is_err() {
                return Some(outcome);
            }
            partner.state.add_status("happiness", 5.0);
            actor.state.add_status("happiness", 2.0);
            touch_pair(
                actor,
                partner,
                RelationshipEdit {
                    trust: 0.05,
                    familiarity: 0.03,
                    reverse: DirectedDelta {
                        attraction: 0.05,
                        ..DirectedDelta::default()
                    },
                    count_interaction: true,
                    ..RelationshipEdit::default()
                },
            );
            outcome.note(format!(
                "{} gave {} a gift",
                actor.state.name, partner.state.name
            ));
        }
        "betray" => {
            let partner = target.as_deref_mut()?;
            touch_pair(
                actor,
                partner,
                RelationshipEdit {
                    trust: -0.35,
                    reverse: DirectedDelta {
                        rivalry: 0.3,
                        fear: 0.1,
                        ..DirectedDelta::default()
                    },
                    count_interaction: true,
                    ..RelationshipEdit::default()
                },
            );
            actor.state.add_status("reputation", -10.0);
            partner.state.add_status("happiness", -5.0);
            outcome.note(format!(
                "{} betrayed {}",
                actor.state.name, partner.state.name
            ));
        }
        "discover" => {
            actor.state.add_skill("science", 0.3);
            actor.state.add_need("purpose", -0.3);
            actor.state.add_status("happiness", 4.0);
            world.add_technology("science", 0.2);
            outcome.note(format!("{} made a small discovery", actor.state.name));
        }
        "become_leader" => {
            actor.state.add_status("reputation", 15.0);
            if world.apply_path_delta("governance.unrest", -5.0).is_err() {
                warn!("unrest path missing during become_leader");
            }
            outcome.world_changes.push(WorldChange::SetLeader {
                name: actor.state.name.clone(),
            });
            outcome.world_changes.push(WorldChange::BroadcastKnowledge {
                text: format!("{} now leads the community", actor.state.name),
            });
            outcome.note(format!("{} stepped up to lead", actor.state.name));
        }
        "have_child" => {
            let partner_name = actor.state.partner.clone()?;
            if outcome.spend(actor, 20.0, "have_child", time).is_err() {
                return Some(outcome);
            }
            actor.state.add_status("happiness", 10.0);
            let child = format!("child of {} and {partner_name}", actor.state.name);
            outcome.world_changes.push(WorldChange::AddChild {
                parent_a: actor.state.name.clone(),
                parent_b: partner_name.clone(),
                child: child.clone(),
            });
            outcome.world_changes.push(WorldChange::BroadcastKnowledge {
                text: format!(
                    "{} and {partner_name} are expecting a child",
                    actor.state.name
                ),
            });
            outcome.note(format!("{child} joins the village"));
        }
        "open_business" => {
            let price = world.price("market_stall");
            if outcome.spend(actor, price, "open_business", time).is_err() {
                return Some(outcome);
            }
            actor.state.owns_business = true;
            actor.state.add_status("reputation", 5.0);
            actor.state.add_need("purpose", -0.3);
            let stall = format!("{}'s stall", actor.state.name);
            outcome.world_changes.push(WorldChange::AddBuilding {
                name: stall.clone(),
                kind: "market_stall".to_owned(),
                owner: Some(actor.state.name.clone()),
            });
            outcome.world_changes.push(WorldChange::BroadcastKnowledge {
                text: format!("{} opened {stall}", actor.state.name),
            });
            outcome.note(format!("{} opened a market stall", actor.state.name));
        }
        "call_event" => {
            actor.state.last_event_called = Some(time);
            outcome.world_changes.push(WorldChange::StartCommunityEvent {
                kind: "gathering".to_owned(),
                details: None,
                caller: actor.state.name.clone(),
            });
            outcome.note(format!("{} called the community together", actor.state.name));
        }
        _ => return None,
    }
    Some(outcome)
}

/// The shared socialize consequence (also the unknown-action fallback).
fn builtin_socialize(outcome: &mut Outcome, actor: &mut Agent, target: Option<&mut Agent>) {
    actor.state.add_need("social", -0.5);
    actor.state.add_status("happiness", 3.0);
    if let Some(partner) = target {
        partner.state.add_need("social", -0.3);
        touch_pair(
            actor,
            partner,
            RelationshipEdit {
                trust: 0.02,
                familiarity: 0.05,
                count_interaction: true,
                ..RelationshipEdit::default()
            },
        );
        outcome.note(format!(
            "{} spent time with {}",
            actor.state.name, partner.state.name
        ));
    } else {
        outcome.note(format!("{} mingled for a while", actor.state.name));
    }
}

/// The flirt consequence, including partnership formation.
fn builtin_flirt(outcome: &mut Outcome, actor: &mut Agent, partner: &mut Agent) {
    actor.state.add_need("romance", -0.3);
    actor.state.add_status("happiness", 2.0);
    touch_pair(
        actor,
        partner,
        RelationshipEdit {
            familiarity: 0.04,
            forward: DirectedDelta {
                attraction: 0.08,
                ..DirectedDelta::default()
            },
            reverse: DirectedDelta {
                attraction: 0.05,
                ..DirectedDelta::default()
            },
            count_interaction: true,
            ..RelationshipEdit::default()
        },
    );
    outcome.note(format!(
        "{} flirted with {}",
        actor.state.name, partner.state.name
    ));

    // Partnership forms at mutual attraction with trust, both single.
    let forward = actor.state.relationship(&partner.state.name);
    let reverse = partner.state.relationship(&actor.state.name);
    if let (Some(forward), Some(reverse)) = (forward, reverse)
        && forward.attraction > PARTNER_ATTRACTION_FORWARD
        && reverse.attraction > PARTNER_ATTRACTION_REVERSE
        && forward.trust > PARTNER_TRUST
        && actor.state.partner.is_none()
        && partner.state.partner.is_none()
    {
        actor.state.partner = Some(partner.state.name.clone());
        partner.state.partner = Some(actor.state.name.clone());
        outcome.world_changes.push(WorldChange::BroadcastKnowledge {
            text: format!(
                "{} and {} have become partners",
                actor.state.name, partner.state.name
            ),
        });
        outcome.note(format!(
            "{} and {} are now partners",
            actor.state.name, partner.state.name
        ));
    }
}

/// Resolve both directed records and apply a paired edit atomically.
fn touch_pair(actor: &mut Agent, partner: &mut Agent, edit: RelationshipEdit) {
    let partner_name = partner.state.name.clone();
    let actor_name = actor.state.name.clone();
    let forward = actor.state.relationship_mut(&partner_name);
    // Both records exist before either side of the edit applies.
    let reverse = partner.state.relationship_mut(&actor_name);
    apply_pair(forward, reverse, &edit);
}

// ---------------------------------------------------------------------------
// Oracle-driven path
// ---------------------------------------------------------------------------

/// Apply a free-form oracle consequence object.
///
/// Every delta is hard-clamped; invalid keys are dropped; anything that
/// is not a JSON object falls back to the built-in `socialize`.
pub fn apply_llm_consequence(
    value: &Value,
    actor: &mut Agent,
    mut target: Option<&mut Agent>,
    world: &mut WorldState,
) -> Outcome {
    let Some(object) = value.as_object() else {
        let mut outcome = Outcome::default();
        builtin_socialize(&mut outcome, actor, target.as_deref_mut());
        return outcome;
    };
    let mut outcome = Outcome::default();

    if let Some(effects) = object.get("agent_effects") {
        apply_effect_block(effects, actor);
    }
    if let Some(partner) = target.as_deref_mut()
        && let Some(effects) = object.get("target_effects")
    {
        apply_effect_block(effects, partner);
    }

    if let Some(partner) = target.as_deref_mut()
        && let Some(rel) = object.get("relationship")
    {
        let clamp = |key: &str| {
            hamlet_oracle::field_f64(rel, key)
                .unwrap_or(0.0)
                .clamp(-CLAMP_RELATIONSHIP, CLAMP_RELATIONSHIP)
        };
        let edit = RelationshipEdit {
            trust: clamp("trust"),
            familiarity: clamp("familiarity"),
            forward: DirectedDelta {
                attraction: clamp("attraction"),
                respect: clamp("respect"),
                fear: clamp("fear"),
                rivalry: clamp("rivalry"),
            },
            reverse: DirectedDelta::default(),
            count_interaction: true,
        };
        touch_pair(actor, partner, edit);
    }

    if let Some(world_deltas) = object.get("world").and_then(|w| w.as_object()) {
        for (path, raw) in world_deltas {
            let Some(delta) = raw.as_f64() else {
                continue;
            };
            let delta = delta.clamp(-CLAMP_WORLD, CLAMP_WORLD);
            if world.frozen.is_frozen(path) {
                continue;
            }
            if world.apply_path_delta(path, delta).is_err() {
                debug!(path = %path, "dropping oracle world delta on unknown field");
            }
        }
    }

    if let Some(assign) = object.get("assign")
        && let Some(partner_name) = hamlet_oracle::field_str(assign, "partner")
        && !partner_name.is_empty()
    {
        actor.state.partner = Some(partner_name.clone());
        if let Some(partner) = target.as_deref_mut()
            && partner.state.name == partner_name
        {
            partner.state.partner = Some(actor.state.name.clone());
        }
    }

    if let Some(knowledge) = hamlet_oracle::field_str(value, "knowledge_all")
        && !knowledge.is_empty()
    {
        outcome.world_changes.push(WorldChange::BroadcastKnowledge {
            text: knowledge,
        });
    }

    let summary = hamlet_oracle::field_str(value, "summary")
        .unwrap_or_else(|| format!("{} acted", actor.state.name));
    outcome.note(summary);
    outcome
}

/// Apply one `{needs: {...}, status: {...}}` block with clamps.
fn apply_effect_block(effects: &Value, agent: &mut Agent) {
    if let Some(needs) = effects.get("needs").and_then(|n| n.as_object()) {
        for (need, raw) in needs {
            if let Some(delta) = raw.as_f64() {
                agent
                    .state
                    .add_need(need, delta.clamp(-CLAMP_NEED, CLAMP_NEED));
            }
        }
    }
    if let Some(status) = effects.get("status").and_then(|s| s.as_object()) {
        for (field, raw) in status {
            if let Some(delta) = raw.as_f64() {
                agent
                    .state
                    .add_status(field, delta.clamp(-CLAMP_STATUS, CLAMP_STATUS));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hamlet_types::TilePos;

    fn agent(name: &str) -> Agent {
        Agent::new(
            name,
            "a warm, friendly villager",
            None,
            30,
            TilePos::new(0, 0),
            None,
            GameTime::START,
        )
    }

    fn world() -> WorldState {
        WorldState::new(None, 2)
    }

    #[test]
    fn eat_relieves_hunger_and_settles_up() {
        // The starvation scenario: hunger 0.95, wealth 10, food 2.5/unit.
        let mut elena = agent("Elena");
        elena.state.set_need("hunger", 0.95);
        elena.state.set_status("wealth", 10.0);
        let mut w = world();
        w.resources.insert("food".to_owned(), 50.0);

        let outcome = apply_builtin("eat", &mut elena, None, &mut w, GameTime::START).unwrap();
        assert!(elena.state.need("hunger") <= 0.25);
        assert!(elena.state.wealth() <= 7.5);
        assert!((w.resource("food") - 49.0).abs() < f64::EPSILON);
        assert_eq!(outcome.transactions.len(), 1);
    }

    #[test]
    fn eat_prefers_carried_food() {
        let mut elena = agent("Elena");
        elena.state.set_need("hunger", 0.8);
        elena.state.inventory.add("bread", "food", 2);
        let mut w = world();
        let food_before = w.resource("food");

        apply_builtin("eat", &mut elena, None, &mut w, GameTime::START).unwrap();
        assert_eq!(elena.state.inventory.quantity_of_kind("food"), 1);
        assert!((w.resource("food") - food_before).abs() < f64::EPSILON);
        assert!((elena.state.wealth() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mutual_flirting_forms_a_partnership() {
        let mut a = agent("Ada");
        let mut b = agent("Bram");
        a.state.relationship_mut("Bram").attraction = 0.65;
        a.state.relationship_mut("Bram").trust = 0.65;
        b.state.relationship_mut("Ada").attraction = 0.65;
        b.state.relationship_mut("Ada").trust = 0.65;
        let mut w = world();

        let first = apply_builtin("flirt", &mut a, Some(&mut b), &mut w, GameTime::START).unwrap();
        assert!(a.state.partner.is_none());
        assert!(first.world_changes.is_empty());

        let second = apply_builtin("flirt", &mut b, Some(&mut a), &mut w, GameTime::START).unwrap();
        assert_eq!(a.state.partner.as_deref(), Some("Bram"));
        assert_eq!(b.state.partner.as_deref(), Some("Ada"));
        assert!(second.world_changes.iter().any(|c| matches!(
            c,
            WorldChange::BroadcastKnowledge { text } if text.contains("partners")
        )));
    }

    #[test]
    fn betray_poisons_the_pair_symmetrically() {
        let mut a = agent("Ada");
        let mut b = agent("Bram");
        a.state.relationship_mut("Bram").trust = 0.8;
        b.state.relationship_mut("Ada").trust = 0.8;
        let mut w = world();

        apply_builtin("betray", &mut a, Some(&mut b), &mut w, GameTime::START).unwrap();
        let forward = a.state.relationship("Bram").unwrap();
        let reverse = b.state.relationship("Ada").unwrap();
        assert!((forward.trust - 0.45).abs() < 1e-9);
        assert!((forward.trust - reverse.trust).abs() < f64::EPSILON);
        assert!((reverse.rivalry - 0.3).abs() < 1e-9);
        assert!((a.state.status_value("reputation") - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overdraw_is_rejected_without_mutation() {
        let mut elena = agent("Elena");
        elena.state.set_status("wealth", 1.0);
        let mut w = world();
        let outcome =
            apply_builtin("open_business", &mut elena, None, &mut w, GameTime::START).unwrap();
        assert!(outcome.world_changes.is_empty());
        assert!(!elena.state.owns_business);
        assert!((elena.state.wealth() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn generic_action_applies_schema_effects() {
        let def: WorldDef = serde_json::from_value(serde_json::json!({
            "needs": [{"id": "hunger", "growth_rate": 0.0004}],
            "actions": [{
                "id": "eat",
                "effects": {"needs": {"hunger": -0.7}, "status": {"energy": 5.0}},
                "inputs": [{"resource": "currency", "amount": 2.5}],
                "world_effects": {"resources.food": -1.0}
            }]
        }))
        .unwrap();
        let mut elena = agent("Elena");
        elena.state.set_need("hunger", 0.95);
        elena.state.set_status("wealth", 10.0);
        let mut w = WorldState::new(Some(&def), 2);
        w.resources.insert("food".to_owned(), 50.0);

        let outcome =
            apply_generic_action("eat", &mut elena, None, &mut w, &def, GameTime::START).unwrap();
        assert!((elena.state.need("hunger") - 0.25).abs() < 1e-9);
        assert!((elena.state.wealth() - 7.5).abs() < 1e-9);
        assert!((w.resource("food") - 49.0).abs() < 1e-9);
        assert!(!outcome.changes.is_empty());
    }

    #[test]
    fn generic_action_rejects_missing_funds_without_mutation() {
        let def: WorldDef = serde_json::from_value(serde_json::json!({
            "actions": [{
                "id": "feast",
                "effects": {"needs": {"hunger": -1.0}},
                "inputs": [{"resource": "currency", "amount": 100.0}]
            }]
        }))
        .unwrap();
        let mut elena = agent("Elena");
        elena.state.set_need("hunger", 0.9);
        let mut w = world();
        let err = apply_generic_action("feast", &mut elena, None, &mut w, &def, GameTime::START);
        assert!(err.is_err());
        assert!((elena.state.need("hunger") - 0.9).abs() < f64::EPSILON);
        assert!((elena.state.wealth() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_effect_action_is_a_noop() {
        let def: WorldDef = serde_json::from_value(serde_json::json!({
            "actions": [{"id": "ponder", "effects": {"needs": {"hunger": 0.0}}}]
        }))
        .unwrap();
        let mut elena = agent("Elena");
        let before = elena.state.clone();
        let mut w = world();
        apply_generic_action("ponder", &mut elena, None, &mut w, &def, GameTime::START).unwrap();
        assert!((elena.state.need("hunger") - before.need("hunger")).abs() < f64::EPSILON);
        assert!((elena.state.wealth() - before.wealth()).abs() < f64::EPSILON);
    }

    #[test]
    fn llm_consequence_clamps_everything() {
        let mut a = agent("Ada");
        let mut b = agent("Bram");
        let mut w = world();
        let value = serde_json::json!({
            "agent_effects": {"needs": {"hunger": -3.0}, "status": {"happiness": 90.0}},
            "target_effects": {"status": {"happiness": -90.0}},
            "relationship": {"trust": 2.0, "attraction": -2.0},
            "world": {"resources.food": 500.0, "economy.moonbeams": 5.0},
            "knowledge_all": "Ada did something remarkable",
            "summary": "a remarkable act"
        });
        a.state.set_need("hunger", 0.6);
        let happiness_before_b = b.state.status_value("happiness");
        let food_before = w.resource("food");

        let outcome = apply_llm_consequence(&value, &mut a, Some(&mut b), &mut w);
        // Need delta clamped to -0.5.
        assert!((a.state.need("hunger") - 0.1).abs() < 1e-9);
        // Status deltas clamped to +-25.
        assert!((b.state.status_value("happiness") - (happiness_before_b - 25.0)).abs() < 1e-9);
        // Relationship clamped to +-0.4 and mirrored on trust.
        let forward = a.state.relationship("Bram").unwrap();
        let reverse = b.state.relationship("Ada").unwrap();
        assert!((forward.trust - 0.7).abs() < 1e-9);
        assert!((forward.trust - reverse.trust).abs() < f64::EPSILON);
        // World delta clamped to +-15, unknown field dropped.
        assert!((w.resource("food") - (food_before + 15.0)).abs() < 1e-9);
        assert!(outcome.world_changes.iter().any(|c| matches!(
            c,
            WorldChange::BroadcastKnowledge { text } if text.contains("remarkable")
        )));
        assert_eq!(outcome.changes, vec!["a remarkable act".to_owned()]);
    }

    #[test]
    fn non_object_consequence_falls_back_to_socialize() {
        let mut a = agent("Ada");
        let mut b = agent("Bram");
        let mut w = world();
        a.state.set_need("social", 0.9);
        apply_llm_consequence(
            &Value::String("gibberish".to_owned()),
            &mut a,
            Some(&mut b),
            &mut w,
        );
        assert!((a.state.need("social") - 0.4).abs() < 1e-9);
        assert_eq!(a.state.relationship("Bram").unwrap().interactions, 1);
    }
}
