//! Upstream resilience and streaming delivery for the AGW model gateway.
//!
//! - [`retry`]: classify upstream failures and drive the retry loop.
//! - [`cooldown`]: escalate long rate limits into per-token cooldowns.
//! - [`pool`]: reusable stream chunk objects.
//! - [`stream`]: server-sent event sessions with heartbeats.

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod logging;
pub mod pool;
pub mod retry;
pub mod stream;
