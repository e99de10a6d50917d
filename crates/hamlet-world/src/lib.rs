//! World state and collaborator surfaces for the Hamlet simulation.
//!
//! # Modules
//!
//! - [`state`] -- resources, economy, governance, environment, alerts
//! - [`evolution`] -- the once-per-day evolution pass
//! - [`map`] -- the tile-map trait and the in-memory grid implementation
//! - [`motion`] -- the agent-motion trait and a recording implementation
//! - [`environment`] -- object states inside buildings
//!
//! The simulation owns exactly one [`WorldState`]; it is mutated by the
//! ticker, the consequence engine, and user commands, all of which honour
//! the frozen-field map.

pub mod environment;
pub mod error;
pub mod evolution;
pub mod map;
pub mod motion;
pub mod state;

pub use environment::EnvironmentTree;
pub use error::WorldError;
pub use evolution::{EvolutionReport, ScholarInput, evolve_day};
pub use map::{GridWorld, TileWorld};
pub use motion::{Motion, MotionCommand, RecordedMotion};
pub use state::{Economy, Environment, Governance, RESOURCE_CEILING, WorldState};
