//! Shared type definitions for the Hamlet simulation.
//!
//! This crate is the single source of truth for the vocabulary used
//! across the Hamlet workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`time`] -- Game-time representation and conversions
//! - [`enums`] -- Closed enumeration types (memory kinds, life stages, ...)
//! - [`worlddef`] -- The per-run world definition schema
//! - [`events`] -- Tick event envelope, deferred world changes, info flow
//! - [`building`] -- Tile positions and building footprints

pub mod building;
pub mod enums;
pub mod events;
pub mod frozen;
pub mod ids;
pub mod time;
pub mod worlddef;

// Re-export the common types at crate root for convenience.
pub use building::{Building, TilePos};
pub use enums::{BondShift, CommunityEventKind, LifeStage, MemoryKind, TickEventKind, Weather};
pub use events::{InfoFlow, TickEvent, Transaction, WorldChange};
pub use frozen::{DEFAULT_FREEZE_SECS, FrozenFields};
pub use ids::{AgentId, CommunityEventId, ConversationId, MemoryId};
pub use time::{GameTime, HOURS_PER_DAY, MINUTES_PER_DAY, MINUTES_PER_HOUR};
pub use worlddef::{
    ActionDef, ActionEffects, NeedDef, OccupationDef, ResourceAmount, SeasonDef, SkillDef,
    TraitDef, WorldDef, default_prices,
};
