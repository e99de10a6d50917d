//! The full agent bundle: state plus the cognitive structures it owns.
//!
//! Ownership is strict: each agent exclusively owns its memory stream,
//! reflection system, and plan hierarchy. The cognitive cycle borrows
//! the bundle for the duration of one agent's turn and releases it
//! before the next agent runs.

use hamlet_types::{GameTime, MemoryKind, TilePos, WorldDef};

use crate::memory::MemoryStream;
use crate::plan::PlanHierarchy;
use crate::reflection::ReflectionSystem;
use crate::state::AgentState;

/// One agent: numerical state plus cognition-owned structures.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Needs, traits, skills, status, relationships, bookkeeping.
    pub state: AgentState,
    /// The agent's memory stream.
    pub memory: MemoryStream,
    /// The agent's reflection trigger and pipeline.
    pub reflection: ReflectionSystem,
    /// The agent's three-level plan.
    pub plan: PlanHierarchy,
}

impl Agent {
    /// Create an agent and stamp its founding memory.
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        occupation: Option<String>,
        age: u32,
        pos: TilePos,
        world_def: Option<&WorldDef>,
        game_time: GameTime,
    ) -> Self {
        let state = AgentState::new(name, personality, occupation, age, pos, world_def);
        let mut memory = MemoryStream::new();
        memory.add(
            format!("{} settled into life in the village", state.name),
            MemoryKind::Event,
            4.0,
            game_time,
        );
        Self {
            state,
            memory,
            reflection: ReflectionSystem::new(),
            plan: PlanHierarchy::new(),
        }
    }

    /// The agent's display name.
    pub fn name(&self) -> &str {
        &self.state.name
    }
}
