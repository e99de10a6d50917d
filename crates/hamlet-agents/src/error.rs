//! Error types for the agents crate.

/// Errors produced by agent state operations.
///
/// Most agent operations are infallible by design (clamp-and-continue);
/// the variants here cover genuine caller mistakes that must surface as
/// user-visible notifications rather than silent state corruption.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A transaction would overdraw the agent's wealth.
    #[error("{agent} cannot afford {amount:.2} (wealth {wealth:.2})")]
    InsufficientFunds {
        /// The agent attempting the payment.
        agent: String,
        /// The amount requested.
        amount: f64,
        /// The wealth available.
        wealth: f64,
    },

    /// A named agent does not exist.
    #[error("unknown agent: {name}")]
    UnknownAgent {
        /// The name that failed to resolve.
        name: String,
    },

    /// An action id has no definition and no built-in fallback.
    #[error("unknown action: {action}")]
    UnknownAction {
        /// The action id that failed to resolve.
        action: String,
    },

    /// A required input resource is missing.
    #[error("{agent} is missing {amount} {resource}")]
    MissingResource {
        /// The agent attempting the action.
        agent: String,
        /// The missing resource id.
        resource: String,
        /// The amount short.
        amount: f64,
    },

    /// The agent is not at the required location.
    #[error("{agent} must be at {location}")]
    WrongLocation {
        /// The agent attempting the action.
        agent: String,
        /// The required building name.
        location: String,
    },
}
