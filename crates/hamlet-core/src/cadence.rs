//! Adaptive cognitive cadence, derived purely from the failure counter.
//!
//! Both the per-invocation batch size and the interval between
//! invocations are pure functions of `(failure_count, rate_limited)`,
//! so backoff behaviour is unit-testable without a clock or an oracle.

/// Ceiling on the cognitive interval in seconds.
pub const MAX_INTERVAL_SECS: f64 = 15.0;

/// Seconds added to the interval per accumulated failure.
const SECS_PER_FAILURE: f64 = 2.0;

/// Number of agents to process this cognitive tick.
///
/// Rate-limited oracles and heavy failure counts drop to single-agent
/// batches; a healthy oracle runs three agents per tick.
pub const fn batch_size(failure_count: u32, rate_limited: bool) -> usize {
    if rate_limited || failure_count > 4 {
        1
    } else if failure_count > 2 {
        2
    } else {
        3
    }
}

/// Interval until the next cognitive tick, in seconds.
///
/// `base + failures * 2`, clamped to [`MAX_INTERVAL_SECS`].
pub fn interval_secs(base_secs: f64, failure_count: u32) -> f64 {
    let raw = base_secs + f64::from(failure_count) * SECS_PER_FAILURE;
    raw.clamp(base_secs.min(MAX_INTERVAL_SECS), MAX_INTERVAL_SECS)
}
