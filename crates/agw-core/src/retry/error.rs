//! Upstream failure shapes and the error returned by the retry loop.

use std::fmt;

/// Structural view of an upstream failure.
///
/// Signal extraction dispatches on this shape alone, so any caller error type
/// can take part by implementing [`UpstreamFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureShape<'a> {
    /// Transport-level failure; may carry the response status and body if one arrived.
    Transport {
        status: Option<u16>,
        body: Option<&'a str>,
    },
    /// Upstream API answered with a non-success status and a raw text body.
    Api { status: u16, body: &'a str },
    /// Plain message. The message may embed a JSON error body.
    Message(&'a str),
}

/// Implemented by any error an upstream operation can fail with.
pub trait UpstreamFailure {
    fn shape(&self) -> FailureShape<'_>;
}

impl<T: UpstreamFailure + ?Sized> UpstreamFailure for &T {
    fn shape(&self) -> FailureShape<'_> {
        (**self).shape()
    }
}

/// Owned upstream error for callers that have no error type of their own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Request did not complete normally (connect/read failure, aborted body).
    #[error("transport: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },
    /// Upstream returned a non-2xx status.
    #[error("upstream HTTP {status}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    Other(String),
}

impl UpstreamError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        UpstreamError::Api {
            status,
            body: body.into(),
        }
    }
}

impl UpstreamFailure for UpstreamError {
    fn shape(&self) -> FailureShape<'_> {
        match self {
            UpstreamError::Transport {
                status,
                message,
                body,
            } => FailureShape::Transport {
                status: *status,
                body: Some(body.as_deref().unwrap_or(message)),
            },
            UpstreamError::Api { status, body } => FailureShape::Api {
                status: *status,
                body,
            },
            UpstreamError::Other(message) => FailureShape::Message(message),
        }
    }
}

/// Why the retry loop gave up and handed the failure back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Status this layer never retries (anything but 429, or 503 without the capacity reason).
    NonRetryableUpstream,
    /// Rate limit long enough that the token/model group was put on cooldown instead.
    EscalatedCooldown { reset_at_ms: u64 },
    /// Every allowed retry was spent.
    RetryBudgetExhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NonRetryableUpstream => write!(f, "non-retryable upstream failure"),
            FailureKind::EscalatedCooldown { reset_at_ms } => {
                write!(f, "rate limited; cooling down until {}", reset_at_ms)
            }
            FailureKind::RetryBudgetExhausted => write!(f, "retry budget exhausted"),
        }
    }
}

/// Error returned by [`run_with_retry`](super::run_with_retry).
///
/// Carries the operation's last failure unchanged; use [`RetryError::into_inner`]
/// to propagate it as-is.
#[derive(Debug)]
pub struct RetryError<E> {
    pub kind: FailureKind,
    /// Total invocations of the operation, including the first.
    pub attempts: u32,
    pub source: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.source
    }

    pub fn inner(&self) -> &E {
        &self.source
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.kind, self.attempts, self.source
        )
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
