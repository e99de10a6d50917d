//! Error types for the core crate.

/// Errors produced by the simulation core.
///
/// These surface only at the host boundary (user commands, setup).
/// Inside the cognitive cycle every failure degrades to an offline path
/// or a logged no-op; errors never cross the cycle boundary.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A user command referenced an agent that does not exist.
    #[error("unknown agent: {name}")]
    UnknownAgent {
        /// The name that failed to resolve.
        name: String,
    },

    /// An `add_character` command re-used an existing name.
    #[error("agent already exists: {name}")]
    DuplicateAgent {
        /// The name that is already taken.
        name: String,
    },

    /// A user command referenced an unknown action id.
    #[error("unknown action: {action}")]
    UnknownAction {
        /// The action id that failed to resolve.
        action: String,
    },

    /// An agent-level operation failed.
    #[error(transparent)]
    Agent(#[from] hamlet_agents::AgentError),

    /// A world-level operation failed.
    #[error(transparent)]
    World(#[from] hamlet_world::WorldError),

    /// An oracle operation failed at a point where the host must know.
    #[error(transparent)]
    Oracle(#[from] hamlet_oracle::OracleError),
}
