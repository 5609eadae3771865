//! Retry and backoff for upstream model calls.
//!
//! This module turns heterogeneous upstream failures into [`ErrorSignal`]s,
//! sizes waits with jittered exponential backoff that honours server hints,
//! and drives the retry loop that request handlers wrap around upstream calls.

mod body;
mod classify;
mod error;
mod policy;
mod run;

pub use classify::{
    extract, extract_at, ErrorSignal, FailureClass, CAPACITY_EXHAUSTED_REASON,
};
pub use error::{FailureKind, FailureShape, RetryError, UpstreamError, UpstreamFailure};
pub use policy::{RetryDecision, RetryPolicy, MAX_JITTER_RATIO};
pub use run::{run_with_retry, RetryContext, RetryOptions};
