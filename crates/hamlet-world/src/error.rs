//! Error types for the world crate.

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A dotted field path did not resolve to a known world field.
    #[error("unknown world field: {path}")]
    UnknownField {
        /// The path that failed to resolve.
        path: String,
    },

    /// A named building does not exist.
    #[error("unknown building: {name}")]
    UnknownBuilding {
        /// The name that failed to resolve.
        name: String,
    },
}
