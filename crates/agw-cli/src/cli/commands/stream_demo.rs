//! `agw stream-demo` – emit a canned completion as server-sent events on stdout.

use anyhow::Result;
use agw_core::config::GatewayConfig;
use agw_core::pool::BufferPool;
use agw_core::stream::{StreamingSession, WriterTransport};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const WORDS: &[&str] = &["Retries ", "back ", "off, ", "streams ", "keep ", "beating. "];

pub async fn run_stream_demo(cfg: &GatewayConfig, chunks: usize, interval_ms: u64) -> Result<()> {
    let pool = BufferPool::with_bound(cfg.pool.max_chunks);
    let transport = WriterTransport::new(tokio::io::stdout());
    let session = StreamingSession::open(transport, cfg.streaming.session_config()).await?;
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    for i in 0..chunks {
        if i > 0 && interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        let mut chunk = pool.acquire();
        let choice = chunk.begin("chatcmpl-demo", "agw-demo", created);
        if i == 0 {
            choice.delta.role = Some("assistant");
        }
        choice.delta.content.push_str(WORDS[i % WORDS.len()]);
        if i + 1 == chunks {
            choice.finish_reason = Some("stop");
        }
        let written = session.emit(&chunk).await?;
        pool.release(chunk);
        if !written {
            tracing::info!(sent = i, "stream-demo: output closed early");
            return Ok(());
        }
    }

    session.end(true).await;
    tracing::debug!(chunks, pooled = pool.len(), "stream-demo finished");
    Ok(())
}
