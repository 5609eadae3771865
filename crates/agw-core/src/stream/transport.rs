use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Response-side primitives a streaming session needs from the host HTTP stack.
#[async_trait]
pub trait EventTransport: Send + 'static {
    fn set_header(&mut self, name: &str, value: &str);

    async fn flush_headers(&mut self) -> io::Result<()>;

    async fn write(&mut self, frame: Bytes) -> io::Result<()>;

    /// Push buffered bytes to the peer, where the transport buffers at all.
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn end(&mut self) -> io::Result<()>;

    fn is_ended(&self) -> bool;

    /// Cancelled when the peer disconnects.
    fn close_signal(&self) -> CancellationToken;
}
