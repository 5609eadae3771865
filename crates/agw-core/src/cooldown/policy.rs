//! Escalate-vs-retry decision for rate-limited upstream calls.

use std::sync::Arc;
use std::time::Duration;

use super::{ModelGrouper, QuotaRefresher, QuotaStore};
use crate::clock;
use crate::retry::{ErrorSignal, RetryContext};

/// Outcome of evaluating one retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CooldownDecision {
    /// Stop retrying and propagate the failure.
    pub escalate: bool,
    /// Cooldown end recorded when escalating (epoch ms).
    pub reset_at_ms: Option<u64>,
}

impl CooldownDecision {
    const RETRY: Self = Self {
        escalate: false,
        reset_at_ms: None,
    };
}

/// Decides when a rate limit should disable a token/model group instead of
/// being retried.
#[derive(Clone)]
pub struct CooldownPolicy {
    threshold: Duration,
    store: Arc<dyn QuotaStore>,
    grouper: Arc<dyn ModelGrouper>,
}

impl CooldownPolicy {
    pub fn new(
        threshold: Duration,
        store: Arc<dyn QuotaStore>,
        grouper: Arc<dyn ModelGrouper>,
    ) -> Self {
        Self {
            threshold,
            store,
            grouper,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Evaluate against the current wall clock.
    pub async fn evaluate(
        &self,
        signal: &ErrorSignal,
        ctx: &RetryContext<'_>,
        refresh: Option<&dyn QuotaRefresher>,
    ) -> CooldownDecision {
        self.evaluate_at(signal, ctx, refresh, clock::now_ms()).await
    }

    /// Only a 429 whose advised delay reaches the threshold, with both token
    /// and model known, can escalate. Capacity errors never do.
    ///
    /// Reset time resolution order: the store's recorded reset for the group,
    /// then the store after one refresh, then the time implied by the signal.
    pub async fn evaluate_at(
        &self,
        signal: &ErrorSignal,
        ctx: &RetryContext<'_>,
        refresh: Option<&dyn QuotaRefresher>,
        now_ms: u64,
    ) -> CooldownDecision {
        if signal.http_status != Some(429) {
            return CooldownDecision::RETRY;
        }
        let Some(delay) = signal.explicit_delay else {
            return CooldownDecision::RETRY;
        };
        if delay < self.threshold {
            return CooldownDecision::RETRY;
        }
        let (Some(token_id), Some(model_id)) = (ctx.token_id, ctx.model_id) else {
            return CooldownDecision::RETRY;
        };

        let group = self.grouper.group_key_of(model_id);
        let mut reset_at = self.recorded_reset(token_id, &group);

        if reset_at.is_none() {
            if let Some(refresher) = refresh {
                if let Err(e) = refresher.refresh_quota(token_id).await {
                    tracing::warn!(
                        token = token_id,
                        error = %e,
                        "quota refresh failed while resolving cooldown"
                    );
                }
                reset_at = self.recorded_reset(token_id, &group);
            }
        }

        let Some(reset_at) = reset_at.or(signal.reset_at_ms) else {
            return CooldownDecision::RETRY;
        };
        if reset_at <= now_ms {
            tracing::debug!(
                token = token_id,
                group = %group,
                reset_at,
                "resolved quota reset already passed; retrying normally"
            );
            return CooldownDecision::RETRY;
        }

        self.store.set_cooldown(token_id, &group, reset_at);
        tracing::info!(
            token = token_id,
            model = model_id,
            group = %group,
            attempt = ctx.attempt,
            cooldown_ms = reset_at - now_ms,
            "token/model group placed on cooldown"
        );
        CooldownDecision {
            escalate: true,
            reset_at_ms: Some(reset_at),
        }
    }

    fn recorded_reset(&self, token_id: &str, group: &str) -> Option<u64> {
        let recorded = self.store.model_group_reset_time(token_id, group);
        recorded.reset_time.filter(|_| recorded.has_data)
    }
}

impl std::fmt::Debug for CooldownPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownPolicy")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
