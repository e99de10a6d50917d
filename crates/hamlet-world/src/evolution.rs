//! Once-per-day world evolution.
//!
//! Separate from the per-minute ticker: season advance by cumulative
//! durations, a daily weather roll, structural decay of buildings with
//! one-shot disrepair alerts, opportunistic technology progress from the
//! community's scholars, and cultural-belief emergence when enough
//! agents' reflections share a keyword signature.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::info;

use hamlet_types::{Weather, WorldDef};

use crate::state::WorldState;

/// Daily structural decay per building.
const CONDITION_DECAY: f64 = 0.5;

/// Condition below which a disrepair alert fires.
const DISREPAIR_THRESHOLD: f64 = 30.0;

/// Occupations that advance community technology.
const SCHOLAR_OCCUPATIONS: &[&str] = &["scholar", "scientist", "scribe"];

/// Fraction of agents that must share a reflection keyword before it
/// hardens into a cultural belief.
const BELIEF_SHARE: f64 = 0.4;

/// A scholar's contribution input: occupation, the skill they practise,
/// and their level in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScholarInput {
    /// Occupation id.
    pub occupation: String,
    /// Primary skill practised by the occupation.
    pub primary_skill: String,
    /// The agent's level in that skill, [0,10].
    pub skill_value: f64,
}

/// What changed during one evolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvolutionReport {
    /// New season name, when the season rolled over.
    pub season_changed: Option<String>,
    /// The weather rolled for the new day.
    pub weather: Weather,
    /// Buildings that newly fell into disrepair.
    pub disrepair: Vec<String>,
    /// Technology levels that advanced: (skill, new level).
    pub technology_advanced: Vec<(String, f64)>,
    /// Newly emerged cultural beliefs.
    pub new_beliefs: Vec<String>,
}

/// Run one day of world evolution.
///
/// Call once per game-day after the day counter increments. The caller
/// supplies the community's scholars and the keyword signatures of every
/// agent's reflections.
pub fn evolve_day(
    world: &mut WorldState,
    def: Option<&WorldDef>,
    scholars: &[ScholarInput],
    reflection_signatures: &[BTreeSet<String>],
) -> EvolutionReport {
    let mut report = EvolutionReport::default();

    // Season advance by cumulative durations.
    if let Some(def) = def
        && let Some(season) = def.season_on_day(world.day)
        && season.name != world.environment.season
    {
        world.environment.season = season.name.clone();
        report.season_changed = Some(season.name.clone());
        info!(season = %season.name, day = world.day, "season changed");
    }

    // Daily weather roll.
    report.weather = roll_weather(&world.environment.season);
    world.environment.weather = report.weather;

    // Structural decay with one-shot disrepair alerts.
    let mut newly_broken = Vec::new();
    for (name, condition) in &mut world.building_condition {
        *condition = (*condition - CONDITION_DECAY).clamp(0.0, 100.0);
        if *condition < DISREPAIR_THRESHOLD && !world.disrepair_alerted.contains(name) {
            newly_broken.push(name.clone());
        }
    }
    for name in newly_broken {
        world.disrepair_alerted.insert(name.clone());
        report.disrepair.push(name);
    }

    // Opportunistic technology progress.
    for scholar in scholars {
        if SCHOLAR_OCCUPATIONS.contains(&scholar.occupation.as_str()) {
            let step = 0.05 * (scholar.skill_value / 10.0).clamp(0.0, 1.0);
            if step > 0.0 {
                world.add_technology(&scholar.primary_skill, step);
                report.technology_advanced.push((
                    scholar.primary_skill.clone(),
                    world.technology_level(&scholar.primary_skill),
                ));
            }
        }
    }

    // Cultural-belief emergence.
    for belief in emergent_beliefs(reflection_signatures, &world.cultural_beliefs) {
        info!(belief = %belief, "cultural belief emerged");
        world.cultural_beliefs.push(belief.clone());
        report.new_beliefs.push(belief);
    }

    report
}

/// Roll the day's weather, loosely shaped by season.
fn roll_weather(season: &str) -> Weather {
    let mut rng = rand::rng();
    let roll: f64 = rng.random();
    if season == "winter" {
        if roll < 0.3 {
            Weather::Snow
        } else if roll < 0.6 {
            Weather::Cloudy
        } else {
            Weather::Clear
        }
    } else if roll < 0.1 {
        Weather::Storm
    } else if roll < 0.35 {
        Weather::Rain
    } else if roll < 0.6 {
        Weather::Cloudy
    } else {
        Weather::Clear
    }
}

/// Keywords shared by at least [`BELIEF_SHARE`] of the signatures that
/// have not already hardened into beliefs.
fn emergent_beliefs(
    signatures: &[BTreeSet<String>],
    existing: &[String],
) -> Vec<String> {
    if signatures.is_empty() {
        return Vec::new();
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for signature in signatures {
        for keyword in signature {
            let entry = counts.entry(keyword.as_str()).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }
    let threshold = (signatures.len() as f64 * BELIEF_SHARE).ceil() as usize;
    counts
        .into_iter()
        .filter(|(keyword, count)| {
            *count >= threshold.max(1)
                && keyword.len() > 3
                && !existing.iter().any(|b| b.contains(keyword))
        })
        .map(|(keyword, _)| format!("The community has come to share a belief about {keyword}"))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn building_decay_alerts_once() {
        let mut world = WorldState::new(None, 5);
        world
            .building_condition
            .insert("mill".to_owned(), 30.2);
        let report = evolve_day(&mut world, None, &[], &[]);
        assert_eq!(report.disrepair, vec!["mill".to_owned()]);
        // Next day: still broken, no new alert.
        let report = evolve_day(&mut world, None, &[], &[]);
        assert!(report.disrepair.is_empty());
    }

    #[test]
    fn scholars_advance_technology() {
        let mut world = WorldState::new(None, 5);
        let scholars = vec![ScholarInput {
            occupation: "scholar".to_owned(),
            primary_skill: "science".to_owned(),
            skill_value: 8.0,
        }];
        let before = world.technology_level("science");
        let report = evolve_day(&mut world, None, &scholars, &[]);
        assert!(world.technology_level("science") > before);
        assert_eq!(report.technology_advanced.len(), 1);
    }

    #[test]
    fn farmers_do_not_advance_technology() {
        let mut world = WorldState::new(None, 5);
        let farmers = vec![ScholarInput {
            occupation: "farmer".to_owned(),
            primary_skill: "farming".to_owned(),
            skill_value: 8.0,
        }];
        let report = evolve_day(&mut world, None, &farmers, &[]);
        assert!(report.technology_advanced.is_empty());
    }

    #[test]
    fn beliefs_emerge_at_forty_percent_share() {
        let signature =
            |words: &[&str]| words.iter().map(|w| (*w).to_owned()).collect::<BTreeSet<_>>();
        // 2 of 5 agents share "harvest": exactly 40%.
        let signatures = vec![
            signature(&["harvest", "rain"]),
            signature(&["harvest"]),
            signature(&["forge"]),
            signature(&["river"]),
            signature(&["walks"]),
        ];
        let beliefs = emergent_beliefs(&signatures, &[]);
        assert!(beliefs.iter().any(|b| b.contains("harvest")));
        // Already-held beliefs never duplicate.
        let again = emergent_beliefs(&signatures, &beliefs);
        assert!(!again.iter().any(|b| b.contains("harvest")));
    }
}
