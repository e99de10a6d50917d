//! World-level mutable state: resources, economy, governance,
//! environment, and bookkeeping.
//!
//! All automatic writes go through the clamping helpers; resources stay
//! non-negative under a bounded ceiling, prosperity and unrest live in
//! [0,100]. Consequence-engine writes arrive as additive deltas on
//! dotted field paths and unknown paths are reported, never applied.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use hamlet_types::{FrozenFields, Weather, WorldDef, default_prices};

use crate::error::WorldError;

/// Ceiling on any single resource amount.
pub const RESOURCE_CEILING: f64 = 999.0;

/// The economy block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Economy {
    /// Currency name.
    pub currency: String,
    /// Price table (food, tool, lodging, healing, gift, market_stall,
    /// plus anything the world definition declares).
    pub prices: BTreeMap<String, f64>,
    /// Tax rate in [0,1].
    pub tax_rate: f64,
    /// Community treasury.
    pub treasury: f64,
    /// Prosperity indicator in [0,100].
    pub prosperity: f64,
}

impl Default for Economy {
    fn default() -> Self {
        let mut prices = BTreeMap::new();
        prices.insert("food".to_owned(), default_prices::FOOD);
        prices.insert("tool".to_owned(), default_prices::TOOL);
        prices.insert("lodging".to_owned(), default_prices::LODGING);
        prices.insert("healing".to_owned(), default_prices::HEALING);
        prices.insert("gift".to_owned(), default_prices::GIFT);
        prices.insert("market_stall".to_owned(), default_prices::MARKET_STALL);
        Self {
            currency: "coin".to_owned(),
            prices,
            tax_rate: 0.1,
            treasury: 0.0,
            prosperity: 50.0,
        }
    }
}

/// The governance block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Governance {
    /// Current leader, if the community has one.
    pub leader: Option<String>,
    /// Council member names.
    pub council: Vec<String>,
    /// Standing laws.
    pub laws: Vec<String>,
    /// Unrest indicator in [0,100].
    pub unrest: f64,
}

/// The environment block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Current season name.
    pub season: String,
    /// Current weather.
    pub weather: Weather,
    /// Soil fertility multiplier in [0,2].
    pub fertility: f64,
    /// Disease risk in [0,1].
    pub disease_risk: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            season: "spring".to_owned(),
            weather: Weather::Clear,
            fertility: 1.0,
            disease_risk: 0.05,
        }
    }
}

/// The complete world state for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Resource amounts, non-negative under [`RESOURCE_CEILING`].
    pub resources: BTreeMap<String, f64>,
    /// Technology levels per skill, [0,10].
    pub technology: BTreeMap<String, f64>,
    /// Economy block.
    pub economy: Economy,
    /// Governance block.
    pub governance: Governance,
    /// Environment block.
    pub environment: Environment,
    /// Living population count.
    pub population: u32,
    /// Day counter, starting at 1.
    pub day: u32,
    /// User-pinned fields the ticker must skip.
    pub frozen: FrozenFields,
    /// One-shot alert flags (food crisis, unrest, prosperity) so the
    /// same announcement never repeats until its condition resets.
    pub alerts: BTreeSet<String>,
    /// Per-building structural condition in [0,100].
    pub building_condition: BTreeMap<String, f64>,
    /// Buildings already announced as in disrepair.
    pub disrepair_alerted: BTreeSet<String>,
    /// Emergent cultural beliefs.
    pub cultural_beliefs: Vec<String>,
}

impl WorldState {
    /// Build a world from an optional definition.
    pub fn new(def: Option<&WorldDef>, population: u32) -> Self {
        let mut state = Self {
            population,
            day: 1,
            ..Self::default()
        };
        state.resources.insert("food".to_owned(), 100.0);
        state.resources.insert("wood".to_owned(), 50.0);
        if let Some(def) = def {
            for (id, amount) in &def.resources {
                state
                    .resources
                    .insert(id.clone(), amount.clamp(0.0, RESOURCE_CEILING));
            }
            for skill in &def.skills {
                state.technology.insert(skill.id.clone(), 1.0);
            }
            for (item, price) in &def.prices {
                state.economy.prices.insert(item.clone(), *price);
            }
            if !def.currency.is_empty() {
                state.economy.currency = def.currency.clone();
            }
            if let Some(season) = def.season_on_day(1) {
                state.environment.season = season.name.clone();
            }
        } else {
            state.technology.insert("farming".to_owned(), 1.0);
            state.technology.insert("science".to_owned(), 1.0);
        }
        state
    }

    /// Read a resource amount (0 when absent).
    pub fn resource(&self, id: &str) -> f64 {
        self.resources.get(id).copied().unwrap_or(0.0)
    }

    /// Add to a resource, clamping into [0, ceiling].
    pub fn add_resource(&mut self, id: &str, delta: f64) {
        let entry = self.resources.entry(id.to_owned()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, RESOURCE_CEILING);
    }

    /// Read a technology level (0 when absent).
    pub fn technology_level(&self, id: &str) -> f64 {
        self.technology.get(id).copied().unwrap_or(0.0)
    }

    /// Add to a technology level, clamping into [0,10].
    pub fn add_technology(&mut self, id: &str, delta: f64) {
        let entry = self.technology.entry(id.to_owned()).or_insert(0.0);
        *entry = (*entry + delta).clamp(0.0, 10.0);
    }

    /// Price of an item from the economy table (1.0 when unknown).
    pub fn price(&self, item: &str) -> f64 {
        self.economy.prices.get(item).copied().unwrap_or(1.0)
    }

    /// Apply an additive delta to a dotted-path field.
    ///
    /// Supported roots: `resources.*`, `technology.*`, `economy.treasury`,
    /// `economy.prosperity`, `governance.unrest`, `environment.fertility`,
    /// `environment.disease_risk`, `population`. Every write clamps to
    /// the field's range; resources and treasury never go negative.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownField`] for unresolvable paths, so
    /// the caller can drop the delta silently and log it.
    pub fn apply_path_delta(&mut self, path: &str, delta: f64) -> Result<(), WorldError> {
        let mut parts = path.splitn(2, '.');
        let root = parts.next().unwrap_or("");
        let field = parts.next().unwrap_or("");
        match (root, field) {
            ("resources", id) if !id.is_empty() => {
                self.add_resource(id, delta);
                Ok(())
            }
            ("technology", id) if !id.is_empty() => {
                self.add_technology(id, delta);
                Ok(())
            }
            ("economy", "treasury") => {
                self.economy.treasury = (self.economy.treasury + delta).max(0.0);
                Ok(())
            }
            ("economy", "prosperity") => {
                self.economy.prosperity = (self.economy.prosperity + delta).clamp(0.0, 100.0);
                Ok(())
            }
            ("governance", "unrest") => {
                self.governance.unrest = (self.governance.unrest + delta).clamp(0.0, 100.0);
                Ok(())
            }
            ("environment", "fertility") => {
                self.environment.fertility = (self.environment.fertility + delta).clamp(0.0, 2.0);
                Ok(())
            }
            ("environment", "disease_risk") => {
                self.environment.disease_risk =
                    (self.environment.disease_risk + delta).clamp(0.0, 1.0);
                Ok(())
            }
            ("population", "") => {
                let rounded = delta.round();
                if rounded >= 0.0 {
                    let add = u32::try_from(rounded as i64).unwrap_or(0);
                    self.population = self.population.saturating_add(add);
                } else {
                    let sub = u32::try_from((-rounded) as i64).unwrap_or(0);
                    self.population = self.population.saturating_sub(sub);
                }
                Ok(())
            }
            _ => Err(WorldError::UnknownField {
                path: path.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resources_clamp_to_the_ceiling() {
        let mut world = WorldState::new(None, 10);
        world.add_resource("food", 5_000.0);
        assert!((world.resource("food") - RESOURCE_CEILING).abs() < f64::EPSILON);
        world.add_resource("food", -5_000.0);
        assert!(world.resource("food").abs() < f64::EPSILON);
    }

    #[test]
    fn dotted_paths_resolve_and_clamp() {
        let mut world = WorldState::new(None, 10);
        world.apply_path_delta("economy.prosperity", 500.0).unwrap();
        assert!((world.economy.prosperity - 100.0).abs() < f64::EPSILON);
        world.apply_path_delta("governance.unrest", 12.0).unwrap();
        assert!((world.governance.unrest - 12.0).abs() < f64::EPSILON);
        world.apply_path_delta("resources.wood", -9_999.0).unwrap();
        assert!(world.resource("wood").abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_paths_are_reported_not_applied() {
        let mut world = WorldState::new(None, 10);
        assert!(world.apply_path_delta("economy.moonbeams", 5.0).is_err());
        assert!(world.apply_path_delta("nonsense", 5.0).is_err());
    }

    #[test]
    fn world_def_seeds_resources_and_prices() {
        let def = WorldDef {
            resources: [("ore".to_owned(), 25.0)].into_iter().collect(),
            prices: [("food".to_owned(), 4.0)].into_iter().collect(),
            currency: "shell".to_owned(),
            ..WorldDef::default()
        };
        let world = WorldState::new(Some(&def), 8);
        assert!((world.resource("ore") - 25.0).abs() < f64::EPSILON);
        assert!((world.price("food") - 4.0).abs() < f64::EPSILON);
        assert_eq!(world.economy.currency, "shell");
    }
}
