//! Headless host for the Hamlet simulation.
//!
//! Wires the cognition core to its collaborators: a grid tile map, a
//! recorded motion system (the headless stand-in for the renderer's
//! movement layer), the oracle, and layered configuration. The game
//! loop runs at roughly 60 fps; the sim-tick accumulator fires once per
//! game minute and the cognitive accumulator at the adaptive interval.
//!
//! On shutdown (Ctrl-C or the configured run length) the research
//! export is written as JSON.

mod export;

use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hamlet_core::{CognitiveCycle, SimConfig, Simulation, cadence, cycle, ticker};
use hamlet_oracle::{Oracle, OracleConfig};
use hamlet_types::{Building, TickEvent, TilePos, WorldDef};
use hamlet_world::{GridWorld, MotionCommand, RecordedMotion, TileWorld};

/// Frame duration for the cooperative loop (about 60 fps).
const FRAME: Duration = Duration::from_millis(16);

/// A villager seeded at startup.
#[derive(Debug, Clone, Deserialize)]
struct AgentSeed {
    /// Unique name.
    name: String,
    /// Free-text personality.
    personality: String,
    /// Occupation id, if any.
    #[serde(default)]
    occupation: Option<String>,
    /// Age in years.
    age: u32,
    /// Starting column.
    #[serde(default)]
    x: i32,
    /// Starting row.
    #[serde(default)]
    y: i32,
}

/// A building seeded at startup.
#[derive(Debug, Clone, Deserialize)]
struct BuildingSeed {
    /// Unique name.
    name: String,
    /// Type tag.
    kind: String,
    /// Top-left column.
    x: i32,
    /// Top-left row.
    y: i32,
    /// Width in tiles.
    #[serde(default = "default_extent")]
    width: u32,
    /// Height in tiles.
    #[serde(default = "default_extent")]
    height: u32,
}

fn default_extent() -> u32 {
    3
}

/// Map dimensions and seeded buildings.
#[derive(Debug, Clone, Deserialize)]
struct MapConfig {
    /// Width in tiles.
    #[serde(default = "default_map_size")]
    width: i32,
    /// Height in tiles.
    #[serde(default = "default_map_size")]
    height: i32,
    /// Buildings to place.
    #[serde(default)]
    buildings: Vec<BuildingSeed>,
}

fn default_map_size() -> i32 {
    80
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_size(),
            height: default_map_size(),
            buildings: Vec::new(),
        }
    }
}

/// The full host configuration.
#[derive(Debug, Clone, Deserialize, Default)]
struct EngineConfig {
    /// Core simulation parameters.
    #[serde(default)]
    sim: SimConfig,
    /// Oracle backend configuration.
    #[serde(default)]
    oracle: OracleConfig,
    /// Inline world definition, if the run uses one.
    #[serde(default)]
    world_def: Option<WorldDef>,
    /// Villagers to seed.
    #[serde(default)]
    agents: Vec<AgentSeed>,
    /// Map layout.
    #[serde(default)]
    map: MapConfig,
    /// Where to write the research export (skipped when unset).
    #[serde(default)]
    export_path: Option<String>,
    /// Stop after this many real seconds (run forever when unset).
    #[serde(default)]
    run_seconds: Option<u64>,
}

/// Load layered configuration: `config/default.yaml` (optional),
/// `config/local.yaml` (optional), then `HAMLET_`-prefixed environment
/// overrides with `__` as the nesting separator.
fn load_config() -> anyhow::Result<EngineConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name("config/local").required(false))
        .add_source(config::Environment::with_prefix("HAMLET").separator("__"))
        .build()
        .context("failed to assemble configuration sources")?;
    settings
        .try_deserialize()
        .context("failed to deserialise configuration")
}

/// Seed the default cast when the configuration names nobody.
fn default_cast() -> Vec<AgentSeed> {
    let seed = |name: &str, personality: &str, occupation: &str, age: u32, x: i32, y: i32| {
        AgentSeed {
            name: name.to_owned(),
            personality: personality.to_owned(),
            occupation: Some(occupation.to_owned()),
            age,
            x,
            y,
        }
    };
    vec![
        seed("Elena", "a quiet, ambitious baker with a curious streak", "baker", 29, 12, 14),
        seed("Bram", "an outgoing, friendly farmer who loves a good story", "farmer", 33, 30, 22),
        seed("Mira", "a curious scholar, passionate about old maps", "scholar", 41, 20, 8),
        seed("Otto", "a bold, driven merchant with an eye for coin", "merchant", 37, 25, 18),
    ]
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,hamlet_core=debug")
        }))
        .init();

    let config = load_config()?;
    let oracle = Oracle::from_config(&config.oracle)?;
    info!(
        has_key = oracle.has_any_key(),
        can_embed = oracle.can_embed(),
        "oracle ready"
    );

    // Map.
    let mut map = GridWorld::new(config.map.width, config.map.height);
    for seed in &config.map.buildings {
        map.add_building(Building {
            name: seed.name.clone(),
            kind: seed.kind.clone(),
            pos: TilePos::new(seed.x, seed.y),
            width: seed.width,
            height: seed.height,
        });
    }
    if map.buildings().is_empty() {
        for (name, kind, x, y) in [
            ("bakery", "shop", 10, 12),
            ("farm", "work", 28, 24),
            ("library", "work", 18, 6),
            ("market", "shop", 24, 16),
            ("tavern", "social", 14, 20),
        ] {
            map.add_building(Building {
                name: name.to_owned(),
                kind: kind.to_owned(),
                pos: TilePos::new(x, y),
                width: 4,
                height: 3,
            });
        }
    }

    // Simulation and cast.
    let mut sim = Simulation::new(config.sim.clone(), config.world_def.clone());
    for building in map.buildings() {
        sim.world
            .building_condition
            .insert(building.name.clone(), 100.0);
    }
    let cast = if config.agents.is_empty() {
        default_cast()
    } else {
        config.agents.clone()
    };
    for seed in cast {
        sim.add_character(
            &seed.name,
            &seed.personality,
            seed.occupation,
            seed.age,
            TilePos::new(seed.x, seed.y),
        )?;
    }
    info!(population = sim.world.population, "simulation seeded");

    let mut cognition = CognitiveCycle::new();
    let mut motion = RecordedMotion::new();
    let started = Instant::now();
    let mut last_frame = Instant::now();
    let mut frames = tokio::time::interval(FRAME);

    loop {
        tokio::select! {
            _ = frames.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
        if config
            .run_seconds
            .is_some_and(|limit| started.elapsed().as_secs() >= limit)
        {
            info!("run length reached");
            break;
        }

        let dt = last_frame.elapsed().as_secs_f64();
        last_frame = Instant::now();
        sim.clock.accumulate(dt);

        // Sim ticks, strictly one per game minute.
        let summary = ticker::advance(&mut sim);
        for day in &summary.new_days {
            let report = ticker::evolve_world(&mut sim);
            info!(day, season = %sim.world.environment.season, "a new day dawns");
            for broken in &report.disrepair {
                let names: Vec<String> = sim.agents.keys().cloned().collect();
                for name in names {
                    sim.pending_events.push_back(TickEvent::world_awareness(
                        name,
                        format!("the {broken} is falling into disrepair"),
                        5,
                    ));
                }
            }
        }

        // Community events elapse by wall clock and announce transitions.
        let transitions = sim.events.step(chrono::Utc::now());
        for (kind, step) in transitions {
            let text = match &step {
                hamlet_events::PhaseStep::Advanced { phase } => {
                    format!("the {} moves on: {}", kind.label(), phase.label)
                }
                _ => format!("the {} has come to an end", kind.label()),
            };
            let names: Vec<String> = sim.agents.keys().cloned().collect();
            for name in names {
                sim.pending_events
                    .push_back(TickEvent::world_awareness(name, text.clone(), 4));
            }
        }

        // Awareness events apply before the next cognitive borrow.
        cycle::route_events(&mut sim);

        // Deferred structural changes; new buildings land on the map.
        for change in sim.drain_world_changes() {
            if let hamlet_types::WorldChange::AddBuilding { name, kind, .. } = change {
                let pos = map.random_walkable(TilePos::new(20, 16), 10);
                map.add_building(Building {
                    name,
                    kind,
                    pos,
                    width: 2,
                    height: 2,
                });
            }
        }

        // Cognitive tick at the adaptive interval.
        let interval = cadence::interval_secs(
            sim.config.cognitive_interval_secs,
            oracle.failure_count(),
        );
        if sim.clock.cognitive_due(interval) {
            cognition.run_batch(&mut sim, &oracle, &map, &mut motion).await;
            apply_motion(&mut sim, &map, motion.drain());
        }
    }

    if let Some(path) = &config.export_path {
        let export = export::build_export(&sim, &oracle);
        std::fs::write(path, serde_json::to_string_pretty(&export)?)
            .with_context(|| format!("failed to write export to {path}"))?;
        info!(path, "research export written");
    }
    Ok(())
}

/// Apply drained motion commands to agent positions.
///
/// In the full game the renderer's movement system animates these; the
/// headless host teleports with a step budget instead. Cognition itself
/// never touches positions.
fn apply_motion(sim: &mut Simulation, map: &GridWorld, commands: Vec<MotionCommand>) {
    for command in commands {
        match command {
            MotionCommand::GoToBuilding { agent, building } => {
                let door = map.building_by_name_fuzzy(&building).map(Building::door);
                if let (Some(door), Some(agent)) = (door, sim.agent_mut(&agent)) {
                    agent.state.pos = door;
                } else {
                    debug!(building, "go_to_building target missing");
                }
            }
            MotionCommand::StartFollowing { agent, target } => {
                let target_pos = sim.agent(&target).map(|t| t.state.pos);
                if let (Some(pos), Some(agent)) = (target_pos, sim.agent_mut(&agent)) {
                    agent.state.pos = TilePos::new(pos.x.saturating_add(1), pos.y);
                }
            }
            MotionCommand::FleeFrom { agent, threat } => {
                info!(agent, threat, "fleeing");
                if let Some(agent) = sim.agent_mut(&agent) {
                    let pos = agent.state.pos;
                    agent.state.pos = map.random_walkable(pos, 12);
                }
            }
            MotionCommand::WalkTo { agent, x, y } => {
                if let Some(agent) = sim.agent_mut(&agent) {
                    agent.state.pos = TilePos::new(x, y);
                }
            }
            MotionCommand::Say { agent, text, .. } => {
                info!(agent, text, "speech");
            }
        }
    }
}
