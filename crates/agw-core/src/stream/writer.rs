//! Transport over any byte sink, e.g. stdout for the CLI demo or a raw socket.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::transport::EventTransport;

/// Writes frames straight to `W`. Headers have no wire form here and are only logged.
#[derive(Debug)]
pub struct WriterTransport<W> {
    inner: W,
    ended: bool,
    disconnect: CancellationToken,
}

impl<W> WriterTransport<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            ended: false,
            disconnect: CancellationToken::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn check(&self, res: io::Result<()>) -> io::Result<()> {
        if let Err(e) = &res {
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
            ) {
                self.disconnect.cancel();
            }
        }
        res
    }
}

#[async_trait]
impl<W> EventTransport for WriterTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn set_header(&mut self, name: &str, value: &str) {
        tracing::debug!(name, value, "stream header");
    }

    async fn flush_headers(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn write(&mut self, frame: Bytes) -> io::Result<()> {
        if self.ended {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream ended"));
        }
        let res = self.inner.write_all(&frame).await;
        self.check(res)
    }

    async fn flush(&mut self) -> io::Result<()> {
        let res = self.inner.flush().await;
        self.check(res)
    }

    async fn end(&mut self) -> io::Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        let res = self.inner.shutdown().await;
        self.check(res)
    }

    fn is_ended(&self) -> bool {
        self.ended
    }

    fn close_signal(&self) -> CancellationToken {
        self.disconnect.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    struct Severed;

    impl AsyncWrite for Severed {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn writes_bytes_verbatim() {
        let mut t = WriterTransport::new(Vec::<u8>::new());
        t.write(Bytes::from_static(b": heartbeat\n\n")).await.unwrap();
        t.end().await.unwrap();
        assert!(t.is_ended());
        assert!(t.write(Bytes::from_static(b"x")).await.is_err());
        assert_eq!(t.into_inner(), b": heartbeat\n\n");
    }

    #[tokio::test]
    async fn broken_pipe_fires_close_signal() {
        let mut t = WriterTransport::new(Severed);
        let signal = t.close_signal();
        assert!(t.write(Bytes::from_static(b"data: 1\n\n")).await.is_err());
        assert!(signal.is_cancelled());
    }
}
