//! Core simulation configuration.
//!
//! Loaded by the host through layered `config` sources (defaults file
//! plus `HAMLET_`-prefixed environment overrides) and passed down by
//! value. Everything here has a sensible default so an empty config
//! file runs.

use serde::Deserialize;

/// Tunable simulation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Real seconds per game minute (1.0 = the default cadence where 60
    /// real seconds make a game hour).
    #[serde(default = "default_seconds_per_game_minute")]
    pub seconds_per_game_minute: f64,
    /// Base cognitive-tick interval in seconds.
    #[serde(default = "default_cognitive_interval")]
    pub cognitive_interval_secs: f64,
    /// Perception radius for other agents, in tiles.
    #[serde(default = "default_agent_radius")]
    pub perceive_agent_radius: u32,
    /// Perception radius for buildings, in tiles.
    #[serde(default = "default_building_radius")]
    pub perceive_building_radius: u32,
    /// Conversation range in tiles.
    #[serde(default = "default_conversation_range")]
    pub conversation_range: u32,
    /// Probability per cycle of hourly plan decomposition.
    #[serde(default = "default_hourly_probability")]
    pub hourly_decompose_probability: f64,
    /// Probability per cycle of detailed plan decomposition.
    #[serde(default = "default_detail_probability")]
    pub detail_decompose_probability: f64,
    /// Probability per cycle of an object-state update pass.
    #[serde(default = "default_object_probability")]
    pub object_update_probability: f64,
    /// Maximum pathfinding steps per request.
    #[serde(default = "default_max_path_steps")]
    pub max_path_steps: usize,
}

fn default_seconds_per_game_minute() -> f64 {
    1.0
}

fn default_cognitive_interval() -> f64 {
    3.5
}

fn default_agent_radius() -> u32 {
    10
}

fn default_building_radius() -> u32 {
    12
}

fn default_conversation_range() -> u32 {
    8
}

fn default_hourly_probability() -> f64 {
    0.15
}

fn default_detail_probability() -> f64 {
    0.10
}

fn default_object_probability() -> f64 {
    0.05
}

fn default_max_path_steps() -> usize {
    400
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seconds_per_game_minute: default_seconds_per_game_minute(),
            cognitive_interval_secs: default_cognitive_interval(),
            perceive_agent_radius: default_agent_radius(),
            perceive_building_radius: default_building_radius(),
            conversation_range: default_conversation_range(),
            hourly_decompose_probability: default_hourly_probability(),
            detail_decompose_probability: default_detail_probability(),
            object_update_probability: default_object_probability(),
            max_path_steps: default_max_path_steps(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_deserialises_to_defaults() {
        let config: SimConfig = serde_json::from_str("{}").unwrap();
        assert!((config.cognitive_interval_secs - 3.5).abs() < f64::EPSILON);
        assert_eq!(config.perceive_agent_radius, 10);
        assert_eq!(config.conversation_range, 8);
    }
}
