//! Classify upstream failures into structured retry signals.

use std::time::Duration;

use serde_json::Value;

use super::body;
use super::error::{FailureShape, UpstreamFailure};
use crate::clock;

/// `reason` an upstream sets when a model is temporarily out of serving capacity.
pub const CAPACITY_EXHAUSTED_REASON: &str = "MODEL_CAPACITY_EXHAUSTED";

/// Delay used for a capacity-exhausted failure that carries no timing hint.
const CAPACITY_FLOOR_MS: u64 = 1000;

/// Failure class of an upstream error, as far as this layer is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP 429; always retried.
    RateLimited,
    /// HTTP 503 with the capacity-exhaustion reason; retried.
    CapacityExhausted,
    /// Anything else; handed straight back to the caller.
    NonRetryable,
}

/// Structured view of one upstream failure. Derived fresh per failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorSignal {
    pub http_status: Option<u16>,
    pub retryable: bool,
    /// Largest server-advised wait found in the body.
    pub explicit_delay: Option<Duration>,
    /// Epoch ms at which the upstream quota resets, as implied by the body.
    pub reset_at_ms: Option<u64>,
    pub reason: Option<String>,
}

impl ErrorSignal {
    pub fn class(&self) -> FailureClass {
        match self.http_status {
            Some(429) => FailureClass::RateLimited,
            Some(503) if self.retryable => FailureClass::CapacityExhausted,
            _ => FailureClass::NonRetryable,
        }
    }

    pub fn explicit_delay_ms(&self) -> Option<u64> {
        self.explicit_delay
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn is_capacity_exhausted(&self) -> bool {
        self.reason.as_deref() == Some(CAPACITY_EXHAUSTED_REASON)
    }
}

/// Timing hints collected from `error.details`.
#[derive(Debug, Default)]
struct DetailHints {
    retry_delay_ms: Option<u64>,
    quota_reset_delay_ms: Option<u64>,
    quota_reset_at_ms: Option<u64>,
    reason: Option<String>,
}

fn max_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    }
}

fn scan_details(details: &[Value]) -> DetailHints {
    let mut hints = DetailHints::default();
    for detail in details {
        if let Some(ms) = detail
            .get("retryDelay")
            .and_then(Value::as_str)
            .and_then(body::parse_duration_ms)
        {
            hints.retry_delay_ms = max_opt(hints.retry_delay_ms, Some(ms));
        }
        if let Some(meta) = detail.get("metadata") {
            if let Some(ms) = meta
                .get("quotaResetDelay")
                .and_then(Value::as_str)
                .and_then(body::parse_duration_ms)
            {
                hints.quota_reset_delay_ms = max_opt(hints.quota_reset_delay_ms, Some(ms));
            }
            if let Some(at) = meta
                .get("quotaResetTimeStamp")
                .and_then(Value::as_str)
                .and_then(body::parse_timestamp_ms)
            {
                hints.quota_reset_at_ms = max_opt(hints.quota_reset_at_ms, Some(at));
            }
        }
        if hints.reason.is_none() {
            if let Some(reason) = detail.get("reason").and_then(Value::as_str) {
                hints.reason = Some(reason.to_string());
            }
        }
    }
    hints
}

/// Extract a signal from an upstream failure using the current wall clock.
pub fn extract<E: UpstreamFailure + ?Sized>(err: &E) -> ErrorSignal {
    extract_at(err, clock::now_ms())
}

/// Extract a signal relative to `now_ms` (epoch ms). Never fails: unreadable
/// bodies yield a signal with no timing hints.
pub fn extract_at<E: UpstreamFailure + ?Sized>(err: &E, now_ms: u64) -> ErrorSignal {
    let (status, raw) = match err.shape() {
        FailureShape::Transport { status, body } => (status, body),
        FailureShape::Api { status, body } => (Some(status), Some(body)),
        FailureShape::Message(message) => (None, Some(message)),
    };

    let parsed = raw.and_then(body::parse_error_body);
    let error = parsed.as_ref().and_then(body::error_object);
    let status = status.or_else(|| error.and_then(body::status_code));
    let hints = error
        .map(|e| scan_details(body::details(e)))
        .unwrap_or_default();

    let until_reset = hints
        .quota_reset_at_ms
        .map(|at| at.saturating_sub(now_ms));
    let mut delay_ms = max_opt(
        max_opt(hints.retry_delay_ms, hints.quota_reset_delay_ms),
        until_reset,
    );

    let capacity = hints.reason.as_deref() == Some(CAPACITY_EXHAUSTED_REASON);
    if capacity && delay_ms.is_none() {
        delay_ms = Some(CAPACITY_FLOOR_MS);
    }

    let retryable = match status {
        Some(429) => true,
        Some(503) => capacity,
        _ => false,
    };

    let reset_at_ms = hints
        .quota_reset_at_ms
        .or_else(|| delay_ms.map(|d| now_ms.saturating_add(d)));

    ErrorSignal {
        http_status: status,
        retryable,
        explicit_delay: delay_ms.map(Duration::from_millis),
        reset_at_ms,
        reason: hints.reason,
    }
}
