//! Oracle-backed plan generation for the three plan levels.
//!
//! Each level renders its own prompt template, parses `HH:MM` entries
//! out of the response, and falls back to the fixed occupation-keyed
//! default plan whenever the oracle cannot help. Parsed entries are
//! validated: unparseable times are dropped, and an empty parse counts
//! as a failure so the fallback still produces a usable day.

use tracing::debug;

use hamlet_agents::{Agent, PlanEntry, default_daily_plan};
use hamlet_oracle::{GenerateOptions, Oracle, field_f64, field_str};
use hamlet_types::GameTime;

/// Ensure the agent has a daily plan for `day`.
///
/// Oracle-first; the ten-slot default plan is the fallback. No-op when
/// the existing plan is already fresh.
pub async fn ensure_daily_plan(agent: &mut Agent, oracle: &Oracle, day: u32) {
    if !agent.plan.is_daily_stale(day) {
        return;
    }
    let entries = match generate_daily(agent, oracle, day).await {
        Some(entries) if !entries.is_empty() => entries,
        _ => default_daily_plan(day, agent.state.occupation.as_deref()),
    };
    agent.plan.set_daily(entries, day);
    debug!(agent = %agent.state.name, day, "daily plan installed");
}

/// Regenerate the rest of the day after a reaction.
///
/// Entries already begun survive; the remainder is replaced by a fresh
/// oracle tail (or the default plan's remaining slots) and both
/// sub-level caches are cleared.
pub async fn replan_after_reaction(agent: &mut Agent, oracle: &Oracle, now: GameTime) {
    let tail = match generate_daily(agent, oracle, now.day).await {
        Some(entries) => entries
            .into_iter()
            .filter(|e| e.start.total_minutes() >= now.total_minutes())
            .collect(),
        None => default_daily_plan(now.day, agent.state.occupation.as_deref())
            .into_iter()
            .filter(|e| e.start.total_minutes() >= now.total_minutes())
            .collect::<Vec<_>>(),
    };
    agent.plan.regenerate_after_reaction(now, tail);
}

/// Decompose the active daily block into hourly entries.
pub async fn decompose_hourly(agent: &mut Agent, oracle: &Oracle, now: GameTime) {
    if agent.plan.hourly_fresh(now) {
        return;
    }
    let Some(parent) = agent.plan.current_daily(now).cloned() else {
        return;
    };
    if let Some(entries) = generate_sub_level(agent, oracle, &parent, "plan_hour", now.day).await {
        agent.plan.set_hourly(entries, now);
    }
}

/// Decompose the active hourly block into detailed 5-15 minute actions.
pub async fn decompose_detailed(agent: &mut Agent, oracle: &Oracle, now: GameTime) {
    if agent.plan.detailed_fresh(now) {
        return;
    }
    let Some(parent) = agent.plan.current_hourly(now).cloned() else {
        return;
    };
    if let Some(entries) =
        generate_sub_level(agent, oracle, &parent, "plan_detail", now.day).await
    {
        agent.plan.set_detailed(entries, now);
    }
}

/// Generate a daily plan through the oracle. `None` on any failure.
async fn generate_daily(agent: &Agent, oracle: &Oracle, day: u32) -> Option<Vec<PlanEntry>> {
    if !oracle.has_any_key() {
        return None;
    }
    let needs_summary: Vec<String> = agent
        .state
        .needs
        .iter()
        .map(|(id, v)| format!("{id}={v:.2}"))
        .collect();
    let memories: Vec<String> = agent
        .memory
        .recent(6)
        .iter()
        .map(|e| e.description.clone())
        .collect();
    let ctx = serde_json::json!({
        "agent_name": agent.state.name,
        "personality": agent.state.personality,
        "occupation": agent.state.occupation,
        "day": day,
        "needs_summary": needs_summary.join(", "),
        "memories": memories,
    });
    let prompt = oracle.prompts().render("plan_day", &ctx).ok()?;
    let response = oracle
        .generate_json(&prompt, GenerateOptions::default())
        .await
        .ok()?;
    let entries = parse_plan_entries(&response, day, None);
    if entries.is_empty() { None } else { Some(entries) }
}

/// Generate one sub-level decomposition through the oracle.
async fn generate_sub_level(
    agent: &Agent,
    oracle: &Oracle,
    parent: &PlanEntry,
    template: &str,
    day: u32,
) -> Option<Vec<PlanEntry>> {
    if !oracle.has_any_key() {
        return None;
    }
    let ctx = serde_json::json!({
        "agent_name": agent.state.name,
        "personality": agent.state.personality,
        "parent_activity": parent.activity,
        "parent_location": parent.location,
        "parent_start": parent.start.clock_label(),
        "parent_duration": parent.duration_minutes,
    });
    let prompt = oracle.prompts().render(template, &ctx).ok()?;
    let response = oracle
        .generate_json(&prompt, GenerateOptions::default())
        .await
        .ok()?;
    let entries = parse_plan_entries(&response, day, Some(parent.location.as_str()));
    if entries.is_empty() { None } else { Some(entries) }
}

/// Parse a `{"plan": [...]}` response into entries for `day`.
///
/// Malformed rows are dropped; a missing location inherits the parent's
/// (or `"outdoors"` at the daily level).
fn parse_plan_entries(
    response: &serde_json::Value,
    day: u32,
    inherited_location: Option<&str>,
) -> Vec<PlanEntry> {
    let Some(rows) = response.get("plan").and_then(|p| p.as_array()) else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for row in rows {
        let Some(activity) = field_str(row, "activity") else {
            continue;
        };
        let Some(start) = field_str(row, "time").and_then(|t| parse_clock(&t, day)) else {
            continue;
        };
        let duration = field_f64(row, "duration_minutes")
            .unwrap_or(30.0)
            .clamp(5.0, 480.0);
        let location = field_str(row, "location")
            .or_else(|| inherited_location.map(str::to_owned))
            .unwrap_or_else(|| "outdoors".to_owned());
        entries.push(PlanEntry {
            start,
            duration_minutes: u32::try_from(duration.round() as i64).unwrap_or(30),
            activity,
            location,
            object: field_str(row, "object").filter(|o| !o.is_empty() && o != "null"),
        });
    }
    entries
}

/// Parse an `HH:MM` clock label into a game time on `day`.
fn parse_clock(label: &str, day: u32) -> Option<GameTime> {
    let mut parts = label.trim().splitn(2, ':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some(GameTime::new(day, hour, minute))
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
            "a quiet baker",
            Some("baker".to_owned()),
            29,
            TilePos::new(0, 0),
            None,
            GameTime::START,
        )
    }

    #[tokio::test]
    async fn oracle_plan_is_parsed_and_installed() {
        let mut a = agent();
        let response = serde_json::json!({"plan": [
            {"time": "06:00", "duration_minutes": 120, "activity": "firing the ovens", "location": "bakery"},
            {"time": "08:00", "duration_minutes": 240, "activity": "baking and selling", "location": "bakery"},
            {"time": "12:00", "duration_minutes": 60, "activity": "lunch at home", "location": "home"},
            {"time": "bogus", "activity": "dropped row"},
            {"time": "13:00", "duration_minutes": 540, "activity": "afternoon rounds", "location": "market"}
        ]})
        .to_string();
        let oracle =
            Oracle::with_backend(Backend::Scripted(ScriptedBackend::new(vec![response]))).unwrap();
        ensure_daily_plan(&mut a, &oracle, 1).await;
        assert_eq!(a.plan.daily().len(), 4);
        assert!(!a.plan.is_daily_stale(1));
        let noon = a.plan.current_daily(GameTime::new(1, 12, 30)).unwrap();
        assert_eq!(noon.activity, "lunch at home");
    }

    #[tokio::test]
    async fn offline_planning_uses_the_default_day() {
        let mut a = agent();
        let oracle = Oracle::with_backend(Backend::Offline).unwrap();
        ensure_daily_plan(&mut a, &oracle, 1).await;
        assert_eq!(a.plan.daily().len(), 10);
        assert!(a.plan.daily().iter().any(|e| e.location == "bakery"));
    }

    #[tokio::test]
    async fn replan_preserves_begun_entries() {
        let mut a = agent();
        let oracle = Oracle::with_backend(Backend::Offline).unwrap();
        ensure_daily_plan(&mut a, &oracle, 1).await;
        let now = GameTime::new(1, 14, 0);
        replan_after_reaction(&mut a, &oracle, now).await;
        // Past entries survive, future entries come from the fallback.
        assert!(a
            .plan
            .daily()
            .iter()
            .any(|e| e.start.total_minutes() < now.total_minutes()));
        assert!(a
            .plan
            .daily()
            .iter()
            .any(|e| e.start.total_minutes() >= now.total_minutes()));
    }

    #[test]
    fn clock_parse_rejects_nonsense() {
        assert!(parse_clock("06:30", 1).is_some());
        assert!(parse_clock("25:00", 1).is_none());
        assert!(parse_clock("sixish", 1).is_none());
    }
}
