//! End-to-end: a flaky upstream behind the retry loop, streamed to a client
//! over an in-process channel using pooled chunks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agw_core::clock;
use agw_core::config::GatewayConfig;
use agw_core::cooldown::{CooldownPolicy, CooldownRegistry, FamilyGrouper};
use agw_core::pool::BufferPool;
use agw_core::retry::{run_with_retry, FailureKind, RetryOptions, UpstreamError};
use agw_core::stream::{channel, StreamingSession};

fn rate_limited(delay: &str) -> UpstreamError {
    UpstreamError::api(
        429,
        format!(r#"{{"error":{{"code":429,"details":[{{"retryDelay":"{delay}"}}]}}}}"#),
    )
}

fn policy_with(registry: &Arc<CooldownRegistry>, cfg: &GatewayConfig) -> CooldownPolicy {
    CooldownPolicy::new(
        cfg.cooldown.threshold(),
        registry.clone(),
        Arc::new(FamilyGrouper),
    )
}

#[tokio::test(start_paused = true)]
async fn retried_completion_streams_to_client() {
    let cfg = GatewayConfig::default();
    let registry = Arc::new(CooldownRegistry::new());
    let cooldown = policy_with(&registry, &cfg);
    let calls = AtomicU32::new(0);

    let tokens: Vec<&str> = run_with_retry(
        &cfg.retry.to_policy(),
        Some(&cooldown),
        cfg.retry.max_retries,
        RetryOptions::new("chat").token("tok-a").model("claude-sonnet-4-5"),
        |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(rate_limited("1s"))
                } else {
                    Ok(vec!["Hel", "lo"])
                }
            }
        },
    )
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(registry.is_empty());

    let pool = BufferPool::with_bound(cfg.pool.max_chunks);
    let (transport, mut body) = channel(cfg.streaming.channel_capacity);
    let session = StreamingSession::open(transport, cfg.streaming.session_config())
        .await
        .unwrap();

    for (i, token) in tokens.iter().enumerate() {
        let mut chunk = pool.acquire();
        let choice = chunk.begin("chatcmpl-1", "claude-sonnet-4-5", 1_700_000_000);
        if i == 0 {
            choice.delta.role = Some("assistant");
        }
        choice.delta.content.push_str(token);
        assert!(session.emit(&chunk).await.unwrap());
        pool.release(chunk);
    }
    assert!(session.end(true).await);
    assert_eq!(pool.len(), 1);

    let headers = body.headers().await.unwrap();
    assert!(headers.contains(&("Cache-Control".to_string(), "no-cache".to_string())));

    let frames: Vec<String> = body
        .collect()
        .await
        .into_iter()
        .map(|b| String::from_utf8(b.to_vec()).unwrap())
        .collect();
    assert_eq!(frames.len(), 3);
    assert!(frames[0].starts_with("data: {\"id\":\"chatcmpl-1\""));
    assert!(frames[0].contains("\"role\":\"assistant\""));
    assert!(frames[1].contains("\"content\":\"lo\""));
    assert!(!frames[1].contains("role"));
    assert_eq!(frames[2], "data: [DONE]\n\n");
}

#[tokio::test(start_paused = true)]
async fn long_rate_limit_puts_group_on_cooldown() {
    let cfg = GatewayConfig::default();
    let registry = Arc::new(CooldownRegistry::new());
    let cooldown = policy_with(&registry, &cfg);
    let calls = AtomicU32::new(0);

    let err = run_with_retry(
        &cfg.retry.to_policy(),
        Some(&cooldown),
        cfg.retry.max_retries,
        RetryOptions::new("chat")
            .token("tok-b")
            .model("gemini-2.5-pro"),
        |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(rate_limited("900s")) }
        },
    )
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(err.kind, FailureKind::EscalatedCooldown { .. }));
    assert!(registry.is_cooling_down("tok-b", "gemini-pro", clock::now_ms()));
    assert!(!registry.is_cooling_down("tok-b", "claude", clock::now_ms()));
}

#[tokio::test(start_paused = true)]
async fn client_disconnect_stops_the_stream() {
    let (transport, body) = channel(4);
    let session = StreamingSession::open(transport, Default::default())
        .await
        .unwrap();
    drop(body);
    tokio::time::timeout(Duration::from_millis(5), session.wait_closed())
        .await
        .unwrap();
    assert!(!session.emit(&"late").await.unwrap());
}
