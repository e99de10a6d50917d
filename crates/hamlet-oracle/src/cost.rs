//! Oracle cost tracking.
//!
//! Records token usage per call and computes estimated spend using
//! configurable per-million-token rates. All monetary calculations use
//! [`rust_decimal::Decimal`] for financial precision -- no floating-point.

use std::fmt;
use std::sync::Mutex;

use rust_decimal::Decimal;

/// One million, the denominator for per-million-token pricing.
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Thread-safe oracle cost tracker.
///
/// Safe to share via `Arc<CostTracker>`; the mutable accumulation state
/// lives behind a mutex.
pub struct CostTracker {
    /// Price per million input tokens.
    input_rate: Decimal,
    /// Price per million output tokens.
    output_rate: Decimal,
    /// Mutable interior state.
    inner: Mutex<CostTrackerInner>,
}

/// Mutable accumulation state held inside the mutex.
#[derive(Debug, Default)]
struct CostTrackerInner {
    /// Total calls recorded.
    total_calls: u64,
    /// Total input tokens across all calls.
    total_input_tokens: u64,
    /// Total output tokens across all calls.
    total_output_tokens: u64,
    /// Running estimated cost.
    total_estimated_cost: Decimal,
}

/// Snapshot of accumulated usage, surfaced in the research export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostSummary {
    /// Total calls recorded.
    pub total_calls: u64,
    /// Total input tokens.
    pub total_input_tokens: u64,
    /// Total output tokens.
    pub total_output_tokens: u64,
    /// Estimated spend in the configured currency.
    pub total_estimated_cost: Decimal,
}

impl CostTracker {
    /// Create a tracker with the given per-million-token rates.
    pub const fn new(input_rate: Decimal, output_rate: Decimal) -> Self {
        Self {
            input_rate,
            output_rate,
            inner: Mutex::new(CostTrackerInner {
                total_calls: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_estimated_cost: Decimal::ZERO,
            }),
        }
    }

    /// Create a tracker with zero rates (counts tokens, costs nothing).
    pub const fn free() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    /// Record one call's token usage.
    pub fn record_call(&self, input_tokens: u64, output_tokens: u64) {
        let input_cost = Decimal::from(input_tokens)
            .checked_mul(self.input_rate)
            .and_then(|c| c.checked_div(ONE_MILLION))
            .unwrap_or(Decimal::ZERO);
        let output_cost = Decimal::from(output_tokens)
            .checked_mul(self.output_rate)
            .and_then(|c| c.checked_div(ONE_MILLION))
            .unwrap_or(Decimal::ZERO);
        let call_cost = input_cost
            .checked_add(output_cost)
            .unwrap_or(Decimal::ZERO);

        if let Ok(mut inner) = self.inner.lock() {
            inner.total_calls = inner.total_calls.saturating_add(1);
            inner.total_input_tokens = inner.total_input_tokens.saturating_add(input_tokens);
            inner.total_output_tokens = inner.total_output_tokens.saturating_add(output_tokens);
            inner.total_estimated_cost = inner
                .total_estimated_cost
                .checked_add(call_cost)
                .unwrap_or(inner.total_estimated_cost);
        }
    }

    /// Snapshot the accumulated totals.
    pub fn summary(&self) -> CostSummary {
        self.inner.lock().map_or(
            CostSummary {
                total_calls: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_estimated_cost: Decimal::ZERO,
            },
            |inner| CostSummary {
                total_calls: inner.total_calls,
                total_input_tokens: inner.total_input_tokens,
                total_output_tokens: inner.total_output_tokens,
                total_estimated_cost: inner.total_estimated_cost,
            },
        )
    }
}

impl fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary();
        f.debug_struct("CostTracker")
            .field("total_calls", &summary.total_calls)
            .field("total_estimated_cost", &summary.total_estimated_cost)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_cost_at_configured_rates() {
        // $0.30 per 1M input, $0.88 per 1M output.
        let tracker = CostTracker::new(Decimal::new(30, 2), Decimal::new(88, 2));
        tracker.record_call(1_000_000, 1_000_000);
        let summary = tracker.summary();
        assert_eq!(summary.total_calls, 1);
        assert_eq!(summary.total_estimated_cost, Decimal::new(118, 2));
    }

    #[test]
    fn free_tracker_counts_tokens_only() {
        let tracker = CostTracker::free();
        tracker.record_call(500, 100);
        tracker.record_call(500, 100);
        let summary = tracker.summary();
        assert_eq!(summary.total_input_tokens, 1000);
        assert_eq!(summary.total_estimated_cost, Decimal::ZERO);
    }
}
