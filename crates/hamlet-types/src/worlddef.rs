//! The world definition schema.
//!
//! A [`WorldDef`] describes everything that varies between runs: which
//! needs agents have and how fast they grow, which traits and skills
//! exist, which occupations produce what, which actions are available and
//! what they cost and yield, the price table, and the seasonal evolution
//! parameters. The schema is immutable once a run starts; subsystems hold
//! it behind a shared handle and drive generic behaviour off it.
//!
//! When no world definition is supplied the simulation falls back to
//! hard-coded rates and the built-in action ladder, so every field here
//! is optional at the call sites that consume it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default critical threshold for a need (applies when unset).
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.9;

/// A need declaration: a monotonically-growing urgency in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedDef {
    /// Stable identifier (`hunger`, `rest`, `social`, ...).
    pub id: String,
    /// Growth per game-minute tick.
    pub growth_rate: f64,
    /// Threshold above which critical status effects apply.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
    /// Status deltas applied per tick while the need is critical.
    #[serde(default)]
    pub critical_effects: BTreeMap<String, f64>,
    /// The action that satisfies this need, if one is declared.
    #[serde(default)]
    pub decay_action: Option<String>,
}

fn default_critical_threshold() -> f64 {
    DEFAULT_CRITICAL_THRESHOLD
}

/// A personality trait declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDef {
    /// Stable identifier (`introversion`, `ambition`, ...).
    pub id: String,
    /// Keywords that raise this trait when found in a free-text
    /// personality description.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Baseline value for agents whose description matches nothing.
    #[serde(default = "default_trait_value")]
    pub default: f64,
}

fn default_trait_value() -> f64 {
    0.5
}

/// A skill declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    /// Stable identifier (`farming`, `science`, `leadership`, ...).
    pub id: String,
    /// Human-readable label for prompts and the export.
    #[serde(default)]
    pub label: Option<String>,
}

/// An occupation declaration with its production loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationDef {
    /// Stable identifier (`farmer`, `scholar`, `merchant`, ...).
    pub id: String,
    /// Resources consumed per work action.
    #[serde(default)]
    pub inputs: Vec<ResourceAmount>,
    /// Resources produced per work action.
    #[serde(default)]
    pub outputs: Vec<ResourceAmount>,
    /// The skill practised by working this occupation.
    pub primary_skill: String,
}

/// A quantity of a named resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmount {
    /// Resource identifier, or the reserved id `currency` for money.
    pub resource: String,
    /// Amount consumed or produced.
    pub amount: f64,
}

/// Numeric effects an action applies to its performer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionEffects {
    /// Need deltas (clamped into [0,1] on application).
    #[serde(default)]
    pub needs: BTreeMap<String, f64>,
    /// Status deltas (clamped into [0,100]).
    #[serde(default)]
    pub status: BTreeMap<String, f64>,
    /// Skill deltas (clamped into [0,10]).
    #[serde(default)]
    pub skills: BTreeMap<String, f64>,
}

impl ActionEffects {
    /// Whether every declared delta is zero.
    pub fn is_noop(&self) -> bool {
        self.needs.values().all(|d| d.abs() < f64::EPSILON)
            && self.status.values().all(|d| d.abs() < f64::EPSILON)
            && self.skills.values().all(|d| d.abs() < f64::EPSILON)
    }
}

/// An action declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Stable identifier (`eat`, `work`, `trade`, ...).
    pub id: String,
    /// Effects on the performing agent.
    #[serde(default)]
    pub effects: ActionEffects,
    /// Resources (or currency) consumed.
    #[serde(default)]
    pub inputs: Vec<ResourceAmount>,
    /// Resources produced into the performer's inventory.
    #[serde(default)]
    pub outputs: Vec<ResourceAmount>,
    /// Additive deltas on dotted-path world fields
    /// (e.g. `resources.food`, `economy.prosperity`).
    #[serde(default)]
    pub world_effects: BTreeMap<String, f64>,
    /// Building name the agent must be at, if any.
    #[serde(default)]
    pub location: Option<String>,
    /// Whether the action involves another agent socially.
    #[serde(default)]
    pub social: bool,
    /// Resources the agent seeks when this is a `trade`-style action.
    #[serde(default)]
    pub needed_resources: Vec<ResourceAmount>,
}

/// A season with its evolution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDef {
    /// Season name (`spring`, `summer`, ...).
    pub name: String,
    /// Length in game days.
    pub duration_days: u32,
    /// Multiplier applied to resource production.
    #[serde(default = "default_multiplier")]
    pub production_multiplier: f64,
    /// Additive per-tick modifiers on need growth rates.
    #[serde(default)]
    pub need_modifiers: BTreeMap<String, f64>,
}

fn default_multiplier() -> f64 {
    1.0
}

/// The complete world definition for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldDef {
    /// World name shown in logs and the export.
    #[serde(default)]
    pub name: String,
    /// Visual style tag consumed by the (out-of-scope) renderer.
    #[serde(default)]
    pub visual_style: String,
    /// Currency name (`coin` by default).
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Starting amounts of world resources.
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
    /// Need declarations.
    #[serde(default)]
    pub needs: Vec<NeedDef>,
    /// Trait declarations merged with the built-in lexicon.
    #[serde(default)]
    pub traits: Vec<TraitDef>,
    /// Skill declarations.
    #[serde(default)]
    pub skills: Vec<SkillDef>,
    /// Occupation declarations.
    #[serde(default)]
    pub occupations: Vec<OccupationDef>,
    /// Action declarations.
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    /// Price table; merged over the built-in defaults.
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    /// Seasonal cycle, in order.
    #[serde(default)]
    pub seasons: Vec<SeasonDef>,
}

fn default_currency() -> String {
    "coin".to_owned()
}

/// Built-in price defaults, used when the definition does not override
/// them and when no definition is active at all.
pub mod default_prices {
    /// Price of one unit of food.
    pub const FOOD: f64 = 2.5;
    /// Price of a basic tool.
    pub const TOOL: f64 = 8.0;
    /// Price of a night of lodging.
    pub const LODGING: f64 = 4.0;
    /// Price of a healing treatment.
    pub const HEALING: f64 = 12.0;
    /// Price of a gift item.
    pub const GIFT: f64 = 5.0;
    /// Price of a market stall (opens a business).
    pub const MARKET_STALL: f64 = 30.0;
}

impl WorldDef {
    /// Look up an action by id.
    pub fn action(&self, id: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Look up a need declaration by id.
    pub fn need(&self, id: &str) -> Option<&NeedDef> {
        self.needs.iter().find(|n| n.id == id)
    }

    /// Look up an occupation by id.
    pub fn occupation(&self, id: &str) -> Option<&OccupationDef> {
        self.occupations.iter().find(|o| o.id == id)
    }

    /// Price of an item, falling back to the built-in defaults.
    pub fn price(&self, item: &str) -> f64 {
        if let Some(p) = self.prices.get(item) {
            return *p;
        }
        match item {
            "food" => default_prices::FOOD,
            "tool" => default_prices::TOOL,
            "lodging" => default_prices::LODGING,
            "healing" => default_prices::HEALING,
            "gift" => default_prices::GIFT,
            "market_stall" => default_prices::MARKET_STALL,
            _ => 1.0,
        }
    }

    /// The season definition active on a given day, walking the cycle by
    /// cumulative durations. Returns `None` when no seasons are declared.
    pub fn season_on_day(&self, day: u32) -> Option<&SeasonDef> {
        let cycle_len: u32 = self
            .seasons
            .iter()
            .map(|s| s.duration_days.max(1))
            .fold(0u32, u32::saturating_add);
        if cycle_len == 0 {
            return None;
        }
        let mut offset = day.saturating_sub(1) % cycle_len;
        for season in &self.seasons {
            let len = season.duration_days.max(1);
            if offset < len {
                return Some(season);
            }
            offset = offset.saturating_sub(len);
        }
        self.seasons.first()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_season_def() -> WorldDef {
        WorldDef {
            seasons: vec![
                SeasonDef {
                    name: "spring".to_owned(),
                    duration_days: 3,
                    production_multiplier: 1.2,
                    need_modifiers: BTreeMap::new(),
                },
                SeasonDef {
                    name: "winter".to_owned(),
                    duration_days: 2,
                    production_multiplier: 0.6,
                    need_modifiers: BTreeMap::new(),
                },
            ],
            ..WorldDef::default()
        }
    }

    #[test]
    fn season_walks_cumulative_durations() {
        let def = two_season_def();
        assert_eq!(def.season_on_day(1).unwrap().name, "spring");
        assert_eq!(def.season_on_day(3).unwrap().name, "spring");
        assert_eq!(def.season_on_day(4).unwrap().name, "winter");
        assert_eq!(def.season_on_day(5).unwrap().name, "winter");
        // Cycle wraps after 5 days.
        assert_eq!(def.season_on_day(6).unwrap().name, "spring");
    }

    #[test]
    fn price_falls_back_to_defaults() {
        let mut def = WorldDef::default();
        assert!((def.price("food") - default_prices::FOOD).abs() < f64::EPSILON);
        def.prices.insert("food".to_owned(), 4.0);
        assert!((def.price("food") - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialises_minimal_yaml_shaped_json() {
        let json = serde_json::json!({
            "name": "riverside",
            "needs": [
                {"id": "hunger", "growth_rate": 0.0004, "decay_action": "eat"}
            ],
            "actions": [
                {"id": "eat", "effects": {"needs": {"hunger": -0.7}}}
            ]
        });
        let def: WorldDef = serde_json::from_value(json).unwrap();
        assert_eq!(def.needs.len(), 1);
        let need = def.need("hunger").unwrap();
        assert!((need.critical_threshold - DEFAULT_CRITICAL_THRESHOLD).abs() < f64::EPSILON);
        assert!(def.action("eat").is_some());
    }
}
