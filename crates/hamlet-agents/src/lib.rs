//! Agent-side state and cognition primitives for the Hamlet simulation.
//!
//! Each agent exclusively owns the structures in this crate: its
//! [`AgentState`], [`MemoryStream`], [`ReflectionSystem`], and
//! [`PlanHierarchy`]. The cognitive cycle borrows them for the duration
//! of one agent's turn; the only cross-agent mutation path is hot-topic
//! diffusion during a conversation that owns both participants.
//!
//! # Modules
//!
//! - [`state`] -- needs, traits, skills, status, family, bookkeeping
//! - [`memory`] -- the bounded memory stream with three-score retrieval
//! - [`reflection`] -- threshold-triggered insight synthesis
//! - [`relationships`] -- directed records and the paired-edit primitive
//! - [`inventory`] -- capped item list
//! - [`knowledge`] -- hot topics and community facts
//! - [`personality`] -- trait derivation from free text
//! - [`plan`] -- the day/hour/detail plan hierarchy

pub mod agent;
pub mod error;
pub mod inventory;
pub mod knowledge;
pub mod memory;
pub mod personality;
pub mod plan;
pub mod reflection;
pub mod relationships;
pub mod state;

pub use agent::Agent;
pub use error::AgentError;
pub use inventory::{INVENTORY_CAP, Inventory, InventoryItem};
pub use knowledge::{HotTopic, Knowledge, TOPIC_TTL_HOURS};
pub use memory::{
    DEFAULT_MAX_ENTRIES, MemoryEntry, MemoryStream, ScoredMemory, cosine_similarity,
    tokenize_keywords,
};
pub use personality::derive_traits;
pub use plan::{PlanEntry, PlanHierarchy, default_daily_plan};
pub use reflection::{DEFAULT_THRESHOLD, ReflectionSystem};
pub use relationships::{DirectedDelta, Relationship, RelationshipEdit, apply_pair};
pub use state::{
    AgentMode, AgentState, CORE_STATUS, FALLBACK_NEEDS, TRANSACTION_RING, WEALTH_CEILING,
};
