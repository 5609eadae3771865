//! Cooldown escalation for sustained rate limiting.
//!
//! A rate limit with a long server-advised wait is not worth retrying in
//! place: the policy records a cooldown for the `(token, model group)` pair
//! and tells the retry loop to give up, so credential selection can route the
//! next request elsewhere until the quota resets.
//!
//! The quota store and model grouping are collaborators behind traits;
//! [`CooldownRegistry`] and [`FamilyGrouper`] are the in-process defaults.

mod group;
mod key;
mod policy;
mod registry;

use async_trait::async_trait;

pub use group::FamilyGrouper;
pub use key::CooldownKey;
pub use policy::{CooldownDecision, CooldownPolicy};
pub use registry::{CooldownEntry, CooldownRegistry};

/// Quota reset time recorded for a token and model group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupResetTime {
    /// Epoch ms at which the group's quota resets, if known.
    pub reset_time: Option<u64>,
    /// Whether any quota data has been recorded for this pair.
    pub has_data: bool,
}

/// Shared quota/cooldown state. Must tolerate concurrent callers;
/// last writer wins.
pub trait QuotaStore: Send + Sync {
    fn model_group_reset_time(&self, token_id: &str, model_group: &str) -> GroupResetTime;
    fn set_cooldown(&self, token_id: &str, model_group: &str, reset_at_ms: u64);
}

/// Maps a model identifier to its quota family.
pub trait ModelGrouper: Send + Sync {
    fn group_key_of(&self, model_id: &str) -> String;
}

/// Pulls fresh quota data for a token into the quota store.
#[async_trait]
pub trait QuotaRefresher: Send + Sync {
    async fn refresh_quota(&self, token_id: &str) -> anyhow::Result<()>;
}
