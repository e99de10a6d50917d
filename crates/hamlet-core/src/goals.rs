//! Goal selection: the deterministic ladder and the oracle overlay.
//!
//! The algorithmic ladder is always available and fully deterministic;
//! it covers survival, social, work, romance, leadership, curiosity,
//! commerce, community events, and family. Oracle-generated goals are
//! preferred when the oracle produces any, and the ladder is the
//! fallback for every failure mode. Between 22:00 and 06:00 a sleep
//! goal is always appended before re-sorting.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use hamlet_agents::Agent;
use hamlet_oracle::{GenerateOptions, Oracle, field_f64, field_str};
use hamlet_types::GameTime;

/// Priority below which the cycle skips goal execution.
pub const EXECUTION_FLOOR: f64 = 0.3;

/// Per-agent cooldown on calling community events, in game days.
const EVENT_COOLDOWN_DAYS: u64 = 2;

/// How a goal is executed by the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    /// Walk to a person and interact on arrival.
    SeekPerson,
    /// Act in place through the consequence engine.
    StayHere,
    /// Walk to a building's door, then act.
    GoToBuilding,
    /// Start a community event.
    CallEvent,
    /// Pick a random walkable tile and go there.
    Wander,
}

impl GoalKind {
    /// Parse an oracle kind tag, defaulting to [`Self::Wander`].
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "seek_person" => Self::SeekPerson,
            "stay_here" => Self::StayHere,
            "go_to_building" => Self::GoToBuilding,
            "call_event" => Self::CallEvent,
            _ => Self::Wander,
        }
    }
}

/// A selected goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Free-text description.
    pub description: String,
    /// Priority; the ladder may exceed 1, oracle goals clamp to [0,1].
    pub priority: f64,
    /// Execution kind.
    pub kind: GoalKind,
    /// Consequence action id to run (`eat`, `flirt`, ...), if any.
    pub action: Option<String>,
    /// Person or building target, if any.
    pub target: Option<String>,
    /// Event details for `call_event` goals.
    pub details: Option<String>,
    /// Whether the oracle proposed this goal.
    pub from_oracle: bool,
}

impl Goal {
    fn ladder(
        description: &str,
        priority: f64,
        kind: GoalKind,
        action: Option<&str>,
        target: Option<String>,
    ) -> Self {
        Self {
            description: description.to_owned(),
            priority,
            kind,
            action: action.map(str::to_owned),
            target,
            details: None,
            from_oracle: false,
        }
    }
}

/// Read-only world context for the ladder's gates.
#[derive(Debug, Clone, Default)]
pub struct GoalContext {
    /// Current leader, if any.
    pub leader: Option<String>,
    /// Unrest in [0,100].
    pub unrest: f64,
    /// Prosperity in [0,100].
    pub prosperity: f64,
    /// Price of a market stall.
    pub stall_price: f64,
    /// Price of a tool.
    pub tool_price: f64,
    /// Names of agents currently without a partner.
    pub unpartnered: BTreeSet<String>,
    /// Current game time.
    pub now: GameTime,
}

// ---------------------------------------------------------------------------
// The algorithmic ladder
// ---------------------------------------------------------------------------

/// Produce the deterministic goal list, sorted by priority descending.
pub fn algorithmic_goals(agent: &Agent, ctx: &GoalContext) -> Vec<Goal> {
    let state = &agent.state;
    let mut goals = Vec::new();

    // Survival.
    let hunger = state.need("hunger");
    if hunger > 0.6 {
        goals.push(Goal::ladder(
            "find something to eat",
            hunger * 2.0,
            GoalKind::StayHere,
            Some("eat"),
            None,
        ));
    }
    let rest = state.need("rest");
    if rest > 0.7 {
        goals.push(Goal::ladder(
            "get some sleep",
            rest * 1.8,
            GoalKind::StayHere,
            Some("sleep"),
            None,
        ));
    }

    // Social.
    let social = state.need("social");
    let introversion = state.trait_value("introversion");
    if social > 0.5 && introversion < 0.7 {
        if let Some((peer, _)) = state.most_familiar_peer() {
            goals.push(Goal::ladder(
                &format!("catch up with {peer}"),
                social * 1.5 * (1.0 - introversion),
                GoalKind::SeekPerson,
                Some("socialize"),
                Some(peer.to_owned()),
            ));
        }
    }

    // Work.
    let purpose = state.need("purpose");
    let ambition = state.trait_value("ambition");
    if purpose > 0.4 {
        goals.push(Goal::ladder(
            "put in some honest work",
            purpose * 1.3 * (0.5 + ambition),
            GoalKind::GoToBuilding,
            Some("work"),
            None,
        ));
    }

    // Romance.
    let romance = state.need("romance");
    let romantic = state.trait_value("romantic");
    if romance > 0.5 && romantic > 0.4 && state.partner.is_none() {
        let flame = state
            .relationships
            .iter()
            .filter(|(name, _)| ctx.unpartnered.contains(*name))
            .max_by(|a, b| a.1.attraction.total_cmp(&b.1.attraction))
            .map(|(name, _)| name.clone());
        if let Some(flame) = flame {
            goals.push(Goal::ladder(
                &format!("spend time with {flame}"),
                romance * 1.4 * romantic,
                GoalKind::SeekPerson,
                Some("flirt"),
                Some(flame),
            ));
        }
    }

    // Leadership.
    if ambition > 0.6
        && state.status_value("reputation") > 50.0
        && state.skill("leadership") > 3.0
        && (ctx.leader.is_none() || ctx.unrest > 40.0)
    {
        goals.push(Goal::ladder(
            "make a bid for leadership",
            ambition * 0.8,
            GoalKind::StayHere,
            Some("become_leader"),
            None,
        ));
    }

    // Curiosity.
    let curiosity = state.trait_value("curiosity");
    if curiosity > 0.6 && state.skill("science") > 2.0 {
        goals.push(Goal::ladder(
            "investigate something new",
            curiosity * 0.6,
            GoalKind::StayHere,
            Some("discover"),
            None,
        ));
    }

    // Commerce: open a business.
    let merchant_flavoured = state
        .occupation
        .as_deref()
        .is_some_and(|o| o.contains("merchant") || o.contains("trader"));
    if state.wealth() >= ctx.stall_price
        && !state.owns_business
        && (ambition > 0.5 || merchant_flavoured)
    {
        goals.push(Goal::ladder(
            "open a market stall",
            0.6 + ambition * 0.2,
            GoalKind::StayHere,
            Some("open_business"),
            None,
        ));
    }

    // Community events, behind the per-agent cooldown.
    if event_cooldown_clear(state.last_event_called, ctx.now) {
        push_event_goals(&mut goals, agent, ctx);
    }

    // Commerce items.
    if state.wealth() >= ctx.tool_price && state.inventory.quantity_of_kind("tool") == 0 {
        goals.push(Goal::ladder(
            "buy a decent tool",
            0.35,
            GoalKind::StayHere,
            Some("buy_item"),
            None,
        ));
    }
    if state.inventory.quantity_of_kind("food") > 5 {
        goals.push(Goal::ladder(
            "sell some surplus food",
            0.3,
            GoalKind::StayHere,
            Some("sell_item"),
            None,
        ));
    }

    // Family.
    if state.partner.is_some() && state.children.is_empty() && state.wealth() > 40.0 {
        goals.push(Goal::ladder(
            "start a family",
            0.25,
            GoalKind::StayHere,
            Some("have_child"),
            None,
        ));
    }

    sort_goals(&mut goals);
    goals
}

/// Whether the two-day event cooldown has elapsed.
fn event_cooldown_clear(last: Option<GameTime>, now: GameTime) -> bool {
    last.is_none_or(|last| {
        now.minutes_since(last) >= EVENT_COOLDOWN_DAYS.saturating_mul(24 * 60)
    })
}

/// The community-event rungs of the ladder.
fn push_event_goals(goals: &mut Vec<Goal>, agent: &Agent, ctx: &GoalContext) {
    let state = &agent.state;
    let reputation = state.status_value("reputation");
    let social = state.need("social");

    let mut event = |variant: &str, priority: f64| {
        goals.push(Goal {
            description: format!("call a community {variant}"),
            priority,
            kind: GoalKind::CallEvent,
            action: None,
            target: None,
            details: Some(variant.to_owned()),
            from_oracle: false,
        });
    };

    if ctx.leader.is_none() && reputation > 55.0 {
        event("election", 0.55);
    }
    if ctx.prosperity > 70.0 && social > 0.4 {
        event("festival", 0.5);
    }
    if ctx.unrest > 50.0 {
        event("meeting", 0.5);
    }
    if state.trait_value("ambition") > 0.7 && ctx.unrest > 30.0 {
        event("rally", 0.5);
    }
    if ctx.unrest > 60.0 && ctx.leader.is_some() && reputation < 50.0 {
        event("protest", 0.6);
    }
    if social > 0.6 && reputation > 40.0 {
        event("gathering", 0.4);
    }
}

/// Append the night-time sleep goal (22:00-06:00) and re-sort.
pub fn append_night_sleep(goals: &mut Vec<Goal>, agent: &Agent, now: GameTime) {
    if !now.is_night() {
        return;
    }
    let rest = agent.state.need("rest");
    goals.push(Goal::ladder(
        "turn in for the night",
        (rest * 1.8).max(0.8),
        GoalKind::StayHere,
        Some("sleep"),
        None,
    ));
    sort_goals(goals);
}

/// Sort by priority descending (stable for equal priorities).
fn sort_goals(goals: &mut [Goal]) {
    goals.sort_by(|a, b| b.priority.total_cmp(&a.priority));
}

/// The top goal, if any.
pub fn get_top_goal(goals: &[Goal]) -> Option<&Goal> {
    goals.first()
}

// ---------------------------------------------------------------------------
// Oracle goals
// ---------------------------------------------------------------------------

/// Ask the oracle for up to two goals from a structured snapshot.
///
/// Returns `None` on any failure or an empty proposal, in which case the
/// caller falls back to the ladder. Priorities are clamped into [0,1]
/// and the `eventDetails` spelling is normalised to `details`.
pub async fn oracle_goals(
    agent: &Agent,
    oracle: &Oracle,
    nearby_summary: &str,
    world_summary: &str,
) -> Option<Vec<Goal>> {
    if !oracle.has_any_key() {
        return None;
    }

    let state = &agent.state;
    let traits_summary: Vec<String> = state
        .traits
        .iter()
        .map(|(id, v)| format!("{id}={v:.2}"))
        .collect();
    let needs_summary: Vec<String> = state
        .needs
        .iter()
        .map(|(id, v)| format!("{id}={v:.2}"))
        .collect();
    let relationships_summary: Vec<String> = state
        .relationships
        .iter()
        .map(|(name, rel)| {
            format!(
                "{name}: {} (trust {:.2}, attraction {:.2}, familiarity {:.2})",
                rel.label, rel.trust, rel.attraction, rel.familiarity
            )
        })
        .collect();
    let memories: Vec<String> = agent
        .memory
        .recent(8)
        .iter()
        .map(|e| e.description.clone())
        .collect();

    let ctx = serde_json::json!({
        "agent_name": state.name,
        "personality": state.personality,
        "traits_summary": traits_summary.join(", "),
        "needs_summary": needs_summary.join(", "),
        "relationships_summary": relationships_summary.join("; "),
        "memories": memories,
        "nearby_summary": nearby_summary,
        "world_summary": world_summary,
        "knowledge_summary": state.knowledge.recent_facts(5).join("; "),
    });

    let prompt = oracle.prompts().render("goals", &ctx).ok()?;
    let response = oracle
        .generate_json(&prompt, GenerateOptions::default())
        .await
        .ok()?;

    let raw_goals = response.get("goals")?.as_array()?;
    let mut goals = Vec::new();
    for raw in raw_goals.iter().take(2) {
        let Some(description) = field_str(raw, "description") else {
            continue;
        };
        let priority = field_f64(raw, "priority").unwrap_or(0.5).clamp(0.0, 1.0);
        let kind = field_str(raw, "kind")
            .map_or(GoalKind::Wander, |tag| GoalKind::parse(&tag));
        // The details field has two spellings in the wild; normalise.
        let details = field_str(raw, "details").or_else(|| field_str(raw, "eventDetails"));
        goals.push(Goal {
            description,
            priority,
            kind,
            action: field_str(raw, "action"),
            target: field_str(raw, "target"),
            details,
            from_oracle: true,
        });
    }

    if goals.is_empty() {
        debug!(agent = %state.name, "oracle proposed no goals; using the ladder");
        return None;
    }
    sort_goals(&mut goals);
    Some(goals)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hamlet_oracle::{Backend, ScriptedBackend};
    use hamlet_types::TilePos;

    fn agent() -> Agent {
        Agent::new(
            "Elena",
            "a quiet, ambitious baker",
            Some("baker".to_owned()),
            29,
            TilePos::new(0, 0),
            None,
            GameTime::START,
        )
    }

    fn ctx() -> GoalContext {
        GoalContext {
            stall_price: 30.0,
            tool_price: 8.0,
            prosperity: 50.0,
            now: GameTime::new(1, 12, 0),
            ..GoalContext::default()
        }
    }

    #[test]
    fn hunger_dominates_when_desperate() {
        let mut a = agent();
        a.state.set_need("hunger", 0.95);
        a.state.set_need("purpose", 0.5);
        let goals = algorithmic_goals(&a, &ctx());
        let top = get_top_goal(&goals).unwrap();
        assert_eq!(top.action.as_deref(), Some("eat"));
        assert!(top.priority > 1.8);
    }

    #[test]
    fn goals_come_sorted_descending() {
        let mut a = agent();
        a.state.set_need("hunger", 0.7);
        a.state.set_need("rest", 0.8);
        a.state.set_need("purpose", 0.6);
        let goals = algorithmic_goals(&a, &ctx());
        for pair in goals.windows(2) {
            if let [first, second] = pair {
                assert!(first.priority >= second.priority);
            }
        }
    }

    #[test]
    fn flirt_requires_an_unpartnered_flame() {
        let mut a = agent();
        a.state.set_need("romance", 0.8);
        a.state.traits.insert("romantic".to_owned(), 0.8);
        a.state.relationship_mut("Bram").attraction = 0.6;
        // Bram is partnered: no flirt goal.
        let goals = algorithmic_goals(&a, &ctx());
        assert!(!goals.iter().any(|g| g.action.as_deref() == Some("flirt")));

        let mut context = ctx();
        context.unpartnered.insert("Bram".to_owned());
        let goals = algorithmic_goals(&a, &context);
        let flirt = goals
            .iter()
            .find(|g| g.action.as_deref() == Some("flirt"))
            .unwrap();
        assert_eq!(flirt.target.as_deref(), Some("Bram"));
    }

    #[test]
    fn event_goals_respect_the_cooldown() {
        let mut a = agent();
        a.state.set_need("social", 0.7);
        let mut context = ctx();
        context.unrest = 55.0;
        let goals = algorithmic_goals(&a, &context);
        assert!(goals.iter().any(|g| g.kind == GoalKind::CallEvent));

        a.state.last_event_called = Some(GameTime::new(1, 10, 0));
        let goals = algorithmic_goals(&a, &context);
        assert!(!goals.iter().any(|g| g.kind == GoalKind::CallEvent));

        // Exactly two days later the cooldown clears.
        context.now = GameTime::new(3, 10, 0);
        let goals = algorithmic_goals(&a, &context);
        assert!(goals.iter().any(|g| g.kind == GoalKind::CallEvent));
    }

    #[test]
    fn night_sleep_is_always_appended() {
        let a = agent();
        let mut goals = Vec::new();
        append_night_sleep(&mut goals, &a, GameTime::new(1, 23, 0));
        assert_eq!(goals.len(), 1);
        assert!(goals.first().unwrap().priority >= 0.8);
        let mut day_goals = Vec::new();
        append_night_sleep(&mut day_goals, &a, GameTime::new(1, 12, 0));
        assert!(day_goals.is_empty());
    }

    #[tokio::test]
    async fn oracle_goals_clamp_and_normalise() {
        let a = agent();
        let response = r#"{"goals": [
            {"description": "visit the mill", "priority": 7.5, "kind": "go_to_building", "target": "mill", "eventDetails": "inspect the wheel"},
            {"description": "drift about", "priority": 0.2, "kind": "nonsense"}
        ]}"#;
        let oracle =
            Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(vec![response]))).unwrap();
        let goals = oracle_goals(&a, &oracle, "nobody nearby", "a calm day")
            .await
            .unwrap();
        assert_eq!(goals.len(), 2);
        let top = goals.first().unwrap();
        assert!((top.priority - 1.0).abs() < f64::EPSILON);
        assert_eq!(top.details.as_deref(), Some("inspect the wheel"));
        assert_eq!(goals.get(1).unwrap().kind, GoalKind::Wander);
    }

    #[tokio::test]
    async fn offline_oracle_defers_to_the_ladder() {
        let a = agent();
        let oracle = Oracle::with_backend(Backend::Offline).unwrap();
        assert!(oracle_goals(&a, &oracle, "", "").await.is_none());
    }
}
