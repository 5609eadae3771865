//! In-process transport: frames go into a bounded channel that an HTTP body
//! (or a test) drains.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::transport::EventTransport;

/// Writer half handed to [`StreamingSession`](super::StreamingSession).
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<mpsc::Sender<Bytes>>,
    headers: Vec<(String, String)>,
    headers_tx: Option<oneshot::Sender<Vec<(String, String)>>>,
    disconnect: CancellationToken,
    done: CancellationToken,
}

/// Reader half. Dropping it counts as the peer disconnecting.
#[derive(Debug)]
pub struct ChannelBody {
    headers_rx: Option<oneshot::Receiver<Vec<(String, String)>>>,
    rx: mpsc::Receiver<Bytes>,
}

/// Build a connected transport/body pair. `capacity` bounds the frames
/// buffered between writer and reader. Must be called inside a tokio runtime.
pub fn channel(capacity: usize) -> (ChannelTransport, ChannelBody) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (headers_tx, headers_rx) = oneshot::channel();
    let disconnect = CancellationToken::new();
    let done = CancellationToken::new();

    let watch_tx = tx.clone();
    let watch_disconnect = disconnect.clone();
    let watch_done = done.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watch_tx.closed() => watch_disconnect.cancel(),
            _ = watch_done.cancelled() => {}
        }
    });

    (
        ChannelTransport {
            tx: Some(tx),
            headers: Vec::new(),
            headers_tx: Some(headers_tx),
            disconnect,
            done,
        },
        ChannelBody {
            headers_rx: Some(headers_rx),
            rx,
        },
    )
}

impl ChannelTransport {
    fn broken_pipe(&self) -> io::Error {
        self.disconnect.cancel();
        io::Error::new(io::ErrorKind::BrokenPipe, "stream body dropped")
    }
}

#[async_trait]
impl EventTransport for ChannelTransport {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    async fn flush_headers(&mut self) -> io::Result<()> {
        let Some(headers_tx) = self.headers_tx.take() else {
            return Ok(());
        };
        headers_tx
            .send(std::mem::take(&mut self.headers))
            .map_err(|_| self.broken_pipe())
    }

    async fn write(&mut self, frame: Bytes) -> io::Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream ended"));
        };
        if tx.send(frame).await.is_err() {
            return Err(self.broken_pipe());
        }
        Ok(())
    }

    async fn end(&mut self) -> io::Result<()> {
        self.tx = None;
        self.headers_tx = None;
        self.done.cancel();
        Ok(())
    }

    fn is_ended(&self) -> bool {
        self.tx.is_none()
    }

    fn close_signal(&self) -> CancellationToken {
        self.disconnect.clone()
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.done.cancel();
    }
}

impl ChannelBody {
    /// Headers flushed by the writer, or `None` if it ended without flushing.
    pub async fn headers(&mut self) -> Option<Vec<(String, String)>> {
        self.headers_rx.take()?.await.ok()
    }

    /// Next frame, or `None` once the writer has ended.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Drain every remaining frame until the writer ends.
    pub async fn collect(mut self) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some(frame) = self.rx.recv().await {
            out.push(frame);
        }
        out
    }

    pub fn into_receiver(self) -> mpsc::Receiver<Bytes> {
        self.rx
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn frames_and_headers_reach_the_body() {
        let (mut t, mut body) = channel(4);
        t.set_header("Content-Type", "text/event-stream");
        t.flush_headers().await.unwrap();
        t.write(Bytes::from_static(b"a")).await.unwrap();
        t.end().await.unwrap();
        assert!(t.is_ended());
        assert_eq!(
            body.headers().await.unwrap(),
            vec![("Content-Type".to_string(), "text/event-stream".to_string())]
        );
        assert_eq!(body.collect().await, vec![Bytes::from_static(b"a")]);
    }

    #[tokio::test]
    async fn dropping_the_body_fires_the_close_signal() {
        let (t, body) = channel(1);
        let signal = t.close_signal();
        drop(body);
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn write_after_body_drop_is_broken_pipe() {
        let (mut t, body) = channel(1);
        drop(body);
        let err = t.write(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(t.close_signal().is_cancelled());
    }

    #[tokio::test]
    async fn ending_does_not_look_like_a_disconnect() {
        let (mut t, mut body) = channel(1);
        let signal = t.close_signal();
        t.end().await.unwrap();
        assert!(body.next_frame().await.is_none());
        tokio::task::yield_now().await;
        assert!(!signal.is_cancelled());
    }
}
