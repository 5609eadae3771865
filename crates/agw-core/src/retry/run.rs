//! Retry loop: run an upstream operation until success, a fatal failure,
//! escalation to a cooldown, or an exhausted budget.

use std::future::Future;

use super::classify::{self, ErrorSignal};
use super::error::{FailureKind, RetryError, UpstreamFailure};
use super::policy::{RetryDecision, RetryPolicy};
use crate::cooldown::{CooldownPolicy, QuotaRefresher};

/// Per-operation retry state handed to the cooldown policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext<'a> {
    /// 0 for the first invocation; never decreases.
    pub attempt: u32,
    pub max_retries: u32,
    pub token_id: Option<&'a str>,
    pub model_id: Option<&'a str>,
}

/// Named options for [`run_with_retry`].
#[derive(Default, Clone, Copy)]
pub struct RetryOptions<'a> {
    /// Prefix for log events, e.g. the handler name.
    pub label: &'a str,
    pub token_id: Option<&'a str>,
    pub model_id: Option<&'a str>,
    /// Called with the attempt number before every invocation, including the first.
    pub on_attempt: Option<&'a (dyn Fn(u32) + Send + Sync)>,
    /// Refreshes the quota store when escalation needs a reset time it does not have.
    pub refresh: Option<&'a dyn QuotaRefresher>,
}

impl<'a> RetryOptions<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub fn token(mut self, token_id: &'a str) -> Self {
        self.token_id = Some(token_id);
        self
    }

    pub fn model(mut self, model_id: &'a str) -> Self {
        self.model_id = Some(model_id);
        self
    }

    pub fn on_attempt(mut self, observer: &'a (dyn Fn(u32) + Send + Sync)) -> Self {
        self.on_attempt = Some(observer);
        self
    }

    pub fn refresh(mut self, refresher: &'a dyn QuotaRefresher) -> Self {
        self.refresh = Some(refresher);
        self
    }
}

impl std::fmt::Debug for RetryOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("label", &self.label)
            .field("token_id", &self.token_id)
            .field("model_id", &self.model_id)
            .field("on_attempt", &self.on_attempt.is_some())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

/// Runs `operation` until it succeeds or retrying stops.
///
/// `operation` receives the attempt number (0 = first call). At most
/// `max_retries + 1` invocations happen. Waits suspend only this task.
/// When `cooldown` is given, long rate limits on a known token/model stop the
/// loop early and put that pair on cooldown.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cooldown: Option<&CooldownPolicy>,
    max_retries: u32,
    options: RetryOptions<'_>,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: UpstreamFailure,
{
    let label = options.label;
    let mut attempt = 0u32;
    loop {
        if let Some(observer) = options.on_attempt {
            observer(attempt);
        }

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let signal = classify::extract(&err);
        let attempts = attempt + 1;
        let fail = move |kind| RetryError {
            kind,
            attempts,
            source: err,
        };

        if !signal.retryable {
            tracing::debug!(
                label,
                attempt,
                status = ?signal.http_status,
                "upstream failure is not retryable"
            );
            return Err(fail(FailureKind::NonRetryableUpstream));
        }

        if let Some(cooldown) = cooldown {
            let ctx = RetryContext {
                attempt,
                max_retries,
                token_id: options.token_id,
                model_id: options.model_id,
            };
            let decision = cooldown.evaluate(&signal, &ctx, options.refresh).await;
            if let (true, Some(reset_at_ms)) = (decision.escalate, decision.reset_at_ms) {
                tracing::warn!(
                    label,
                    attempt,
                    token = ?options.token_id,
                    model = ?options.model_id,
                    reset_at_ms,
                    "rate limit escalated to cooldown; not retrying"
                );
                return Err(fail(FailureKind::EscalatedCooldown { reset_at_ms }));
            }
        }

        match policy.decide(attempt, max_retries, &signal) {
            RetryDecision::NoRetry => {
                tracing::warn!(
                    label,
                    attempts,
                    status = ?signal.http_status,
                    "retry budget exhausted"
                );
                return Err(fail(FailureKind::RetryBudgetExhausted));
            }
            RetryDecision::RetryAfter(delay) => {
                log_retry(label, attempt, max_retries, &signal, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn log_retry(
    label: &str,
    attempt: u32,
    max_retries: u32,
    signal: &ErrorSignal,
    delay: std::time::Duration,
) {
    tracing::info!(
        label,
        retry = attempt + 1,
        max_retries,
        status = ?signal.http_status,
        class = ?signal.class(),
        hint_ms = ?signal.explicit_delay_ms(),
        delay_ms = delay.as_millis() as u64,
        "retrying upstream call"
    );
}
