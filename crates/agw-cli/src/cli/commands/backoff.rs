//! `agw backoff` – show the retry schedule for the configured policy.

use agw_core::config::GatewayConfig;
use std::time::Duration;

pub fn run_backoff(cfg: &GatewayConfig, hint_ms: Option<u64>, attempts: u32) {
    let policy = cfg.retry.to_policy();
    let hint = hint_ms.map(Duration::from_millis);
    println!("{:<8} {:>10}", "RETRY", "DELAY_MS");
    for (retry, delay) in schedule(&policy, hint, attempts) {
        println!("{:<8} {:>10}", retry, delay.as_millis());
    }
    if attempts > cfg.retry.max_retries {
        println!(
            "(retry loop stops after {} retries with current config)",
            cfg.retry.max_retries
        );
    }
}

fn schedule(
    policy: &agw_core::retry::RetryPolicy,
    hint: Option<Duration>,
    attempts: u32,
) -> Vec<(u32, Duration)> {
    (1..=attempts)
        .map(|retry| (retry, policy.backoff(retry, hint)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agw_core::retry::RetryPolicy;

    #[test]
    fn schedule_has_one_row_per_retry_and_respects_cap() {
        let policy = RetryPolicy::default();
        let rows = schedule(&policy, None, 10);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].0, 1);
        assert!(rows.iter().all(|(_, d)| *d <= policy.max_delay));
    }

    #[test]
    fn hint_sets_the_floor() {
        let policy = RetryPolicy::default();
        for (_, d) in schedule(&policy, Some(Duration::from_secs(3)), 2) {
            assert!(d >= Duration::from_millis(3050));
        }
    }
}
