//! The Hamlet simulation core.
//!
//! Couples the numerical state machine (ticker, needs, economy,
//! relationships) with the LLM oracle (plans, reactions, conversations,
//! free-form consequences). Everything oracle-facing has a working
//! offline path, so the simulation never halts when the model is slow,
//! rate-limited, or absent.
//!
//! # Modules
//!
//! - [`sim`] -- the simulation aggregate and ownership rules
//! - [`clock`] -- game time and the cooperative accumulators
//! - [`ticker`] -- the per-game-minute tick and the daily entry points
//! - [`cadence`] -- pure adaptive batch-size and interval functions
//! - [`cycle`] -- the per-agent cognitive pipeline and event routing
//! - [`goals`] -- the deterministic goal ladder and oracle goals
//! - [`planner`] -- oracle-backed plan generation with fixed fallbacks
//! - [`consequence`] -- schema-driven, built-in, and oracle consequences
//! - [`conversation`] -- turn-by-turn dialogue and topic diffusion
//! - [`config`] -- tunable parameters

pub mod cadence;
pub mod clock;
pub mod config;
pub mod consequence;
pub mod conversation;
pub mod cycle;
pub mod error;
pub mod goals;
pub mod planner;
pub mod sim;
pub mod ticker;

pub use cadence::{MAX_INTERVAL_SECS, batch_size, interval_secs};
pub use clock::GameClock;
pub use config::SimConfig;
pub use consequence::{Outcome, apply_action, apply_builtin, apply_generic_action, apply_llm_consequence};
pub use conversation::{ConversationEngine, ConversationOutcome};
pub use cycle::{CognitiveCycle, route_events};
pub use error::CoreError;
pub use goals::{EXECUTION_FLOOR, Goal, GoalContext, GoalKind, algorithmic_goals, get_top_goal};
pub use sim::Simulation;
pub use ticker::{TickSummary, advance, collect_taxes, evolve_world, run_one_tick};
