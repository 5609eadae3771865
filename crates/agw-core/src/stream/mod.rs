//! Streaming delivery: server-sent event sessions with heartbeats.
//!
//! A [`StreamingSession`] owns one [`EventTransport`] and writes three kinds
//! of frame to it: `data: <json>`, the `: heartbeat` comment, and the
//! `data: [DONE]` terminator. Two transports ship here: [`ChannelTransport`]
//! for handing frames to an HTTP body and [`WriterTransport`] for any
//! `AsyncWrite`.

mod channel;
pub mod frame;
mod session;
mod transport;
mod writer;

pub use channel::{channel, ChannelBody, ChannelTransport};
pub use session::{
    SessionConfig, SessionError, SessionState, StreamingSession, MAX_HEARTBEAT_INTERVAL,
};
pub use transport::EventTransport;
pub use writer::WriterTransport;
