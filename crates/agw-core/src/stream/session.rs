//! One outbound event stream: `INIT -> STREAMING -> CLOSED`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::frame::{self, DONE_FRAME, HEARTBEAT_FRAME};
use super::transport::EventTransport;

const INIT: u8 = 0;
const STREAMING: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to serialise stream payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("stream transport: {0}")]
    Transport(#[from] std::io::Error),
}

/// Longest heartbeat interval a session accepts; longer ones are clamped.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

struct Io<T> {
    transport: T,
    buf: BytesMut,
}

/// State shared between the session handle and its heartbeat task. Every
/// write happens under the `io` lock after checking `state`, so nothing is
/// written once the session is closed.
struct Shared<T> {
    io: Mutex<Io<T>>,
    state: AtomicU8,
    closed: CancellationToken,
}

impl<T: EventTransport> Shared<T> {
    fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    async fn write_frame(&self, io: &mut Io<T>, frame: Bytes) -> bool {
        if self.is_closed() || io.transport.is_ended() {
            return false;
        }
        let res = match io.transport.write(frame).await {
            Ok(()) => io.transport.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            tracing::debug!(error = %e, "stream write failed; closing session");
            self.close_locked(io, false).await;
            return false;
        }
        true
    }

    /// Enter `CLOSED`. Only the first caller does any work.
    async fn close_locked(&self, io: &mut Io<T>, write_terminator: bool) -> bool {
        if self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
            return false;
        }
        self.closed.cancel();
        if !io.transport.is_ended() {
            if write_terminator
                && io
                    .transport
                    .write(Bytes::from_static(DONE_FRAME))
                    .await
                    .is_ok()
            {
                let _ = io.transport.flush().await;
            }
            if let Err(e) = io.transport.end().await {
                tracing::debug!(error = %e, "ending stream transport failed");
            }
        }
        true
    }
}

/// Handle to an open event stream.
///
/// Exactly one heartbeat task runs per session; it stops as soon as the
/// session closes, whether by [`end`](Self::end), a failed write, the peer
/// disconnecting, or the handle being dropped.
pub struct StreamingSession<T: EventTransport> {
    shared: Arc<Shared<T>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl<T: EventTransport> StreamingSession<T> {
    /// Configure `transport` for unbuffered event-stream delivery and start the heartbeat.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self, SessionError> {
        let disconnect = transport.close_signal();
        let shared = Arc::new(Shared {
            io: Mutex::new(Io {
                transport,
                buf: BytesMut::with_capacity(1024),
            }),
            state: AtomicU8::new(INIT),
            closed: CancellationToken::new(),
        });

        {
            let mut io = shared.io.lock().await;
            let t = &mut io.transport;
            t.set_header("Content-Type", "text/event-stream");
            t.set_header("Cache-Control", "no-cache");
            t.set_header("Connection", "keep-alive");
            t.set_header("X-Accel-Buffering", "no");
            if let Err(e) = t.flush_headers().await {
                shared.state.store(CLOSED, Ordering::Release);
                shared.closed.cancel();
                return Err(e.into());
            }
            shared.state.store(STREAMING, Ordering::Release);
        }

        let every = config
            .heartbeat_interval
            .clamp(Duration::from_millis(1), MAX_HEARTBEAT_INTERVAL);
        let heartbeat = tokio::spawn(heartbeat_loop(Arc::clone(&shared), every, disconnect));
        tracing::debug!(
            heartbeat_ms = every.as_millis() as u64,
            "streaming session opened"
        );
        Ok(Self {
            shared,
            heartbeat: Some(heartbeat),
        })
    }

    pub fn state(&self) -> SessionState {
        match self.shared.state.load(Ordering::Acquire) {
            INIT => SessionState::Init,
            STREAMING => SessionState::Streaming,
            _ => SessionState::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Resolves once the session is closed for any reason.
    pub async fn wait_closed(&self) {
        self.shared.closed.cancelled().await;
    }

    /// Write `payload` as one `data:` frame. Returns `Ok(false)` without
    /// writing anything once the session is closed.
    pub async fn emit<P: Serialize + ?Sized>(&self, payload: &P) -> Result<bool, SessionError> {
        if self.is_closed() {
            return Ok(false);
        }
        let mut io = self.shared.io.lock().await;
        if self.is_closed() {
            return Ok(false);
        }
        let frame = frame::encode_data(&mut io.buf, payload)?;
        Ok(self.shared.write_frame(&mut io, frame).await)
    }

    /// Close the session, optionally sending `data: [DONE]` first.
    /// Idempotent; returns `true` only for the call that closed it.
    pub async fn end(&self, write_terminator: bool) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut io = self.shared.io.lock().await;
        let closed = self.shared.close_locked(&mut io, write_terminator).await;
        if closed {
            tracing::debug!(write_terminator, "streaming session ended");
        }
        closed
    }
}

impl<T: EventTransport> Drop for StreamingSession<T> {
    fn drop(&mut self) {
        self.shared.state.store(CLOSED, Ordering::Release);
        self.shared.closed.cancel();
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

impl<T: EventTransport> std::fmt::Debug for StreamingSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("state", &self.state())
            .finish()
    }
}

async fn heartbeat_loop<T: EventTransport>(
    shared: Arc<Shared<T>>,
    every: Duration,
    disconnect: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shared.closed.cancelled() => break,
            _ = disconnect.cancelled() => {
                let mut io = shared.io.lock().await;
                if shared.close_locked(&mut io, false).await {
                    tracing::debug!("peer disconnected; streaming session closed");
                }
                break;
            }
            _ = ticker.tick() => {
                let mut io = shared.io.lock().await;
                if !shared.write_frame(&mut io, Bytes::from_static(HEARTBEAT_FRAME)).await {
                    break;
                }
            }
        }
    }
}
