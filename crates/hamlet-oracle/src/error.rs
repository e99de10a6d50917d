//! Error types for the oracle crate.

/// Errors produced by oracle operations.
///
/// Callers treat [`RateLimited`](OracleError::RateLimited) and
/// [`Timeout`](OracleError::Timeout) as transient (they feed the adaptive
/// failure counter) and [`Unavailable`](OracleError::Unavailable) as a
/// signal to take the offline path immediately.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// No API key is configured, or the backend has no such capability.
    #[error("oracle unavailable: {reason}")]
    Unavailable {
        /// Why the oracle cannot serve this call.
        reason: String,
    },

    /// The backend returned HTTP 429 or an explicit rate-limit signal.
    #[error("oracle rate limited")]
    RateLimited,

    /// The call exceeded its deadline.
    #[error("oracle call timed out after {deadline_ms}ms")]
    Timeout {
        /// The deadline that was exceeded, in milliseconds.
        deadline_ms: u64,
    },

    /// The backend failed (network error, non-success status, bad payload).
    #[error("oracle backend error: {0}")]
    Backend(String),

    /// A prompt template failed to load or render.
    #[error("prompt template error: {0}")]
    Template(String),

    /// The response could not be parsed into the expected shape, even
    /// after all recovery strategies.
    #[error("oracle response parse error: {0}")]
    Parse(String),
}

impl OracleError {
    /// Whether this error should increment the adaptive failure counter.
    ///
    /// `Unavailable` does not count: the caller knew the capability was
    /// absent and falls through to its offline path. Parse failures are
    /// partial successes handled field-by-field.
    pub const fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout { .. } | Self::Backend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_not_a_failure() {
        let err = OracleError::Unavailable {
            reason: "no key".to_owned(),
        };
        assert!(!err.counts_as_failure());
        assert!(OracleError::RateLimited.counts_as_failure());
        assert!(OracleError::Timeout { deadline_ms: 100 }.counts_as_failure());
    }
}
