//! In-memory cooldown registry shared by every retry loop of a process.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use super::{CooldownKey, GroupResetTime, QuotaStore};

/// Per `(token, model group)` quota observations and cooldown window.
#[derive(Debug, Clone)]
pub struct CooldownEntry {
    pub key: CooldownKey,
    /// Quota reset time reported by the quota refresh side (epoch ms).
    pub quota_reset_at: Option<u64>,
    /// Whether the quota side has reported for this pair at all.
    pub has_quota_data: bool,
    /// Requests for this pair should be avoided until this time (epoch ms).
    pub cooldown_until: Option<u64>,
    pub escalations: u32,
    pub last_escalated_at: Option<Instant>,
}

impl CooldownEntry {
    fn new(key: CooldownKey) -> Self {
        Self {
            key,
            quota_reset_at: None,
            has_quota_data: false,
            cooldown_until: None,
            escalations: 0,
            last_escalated_at: None,
        }
    }
}

/// Thread-safe store of quota reset times and cooldown windows.
///
/// Created once by the composition root and shared (`Arc`) with the cooldown
/// policy and the credential selector. Concurrent writers to the same key
/// resolve last-writer-wins.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    entries: RwLock<HashMap<CooldownKey, CooldownEntry>>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entry<R>(
        &self,
        token_id: &str,
        model_group: &str,
        f: impl FnOnce(&mut CooldownEntry) -> R,
    ) -> R {
        let key = CooldownKey::new(token_id, model_group);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CooldownEntry::new(key));
        f(entry)
    }

    /// Snapshot of the entry for `key`, if present.
    pub fn get(&self, key: &CooldownKey) -> Option<CooldownEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Record what the quota side knows about a pair. `None` means the quota
    /// was read but carries no reset time.
    pub fn record_quota_reset(
        &self,
        token_id: &str,
        model_group: &str,
        reset_at_ms: Option<u64>,
    ) {
        self.with_entry(token_id, model_group, |entry| {
            entry.quota_reset_at = reset_at_ms;
            entry.has_quota_data = true;
        });
    }

    /// End of the active cooldown for a pair, if it is later than `now_ms`.
    pub fn cooldown_until(&self, token_id: &str, model_group: &str, now_ms: u64) -> Option<u64> {
        let key = CooldownKey::new(token_id, model_group);
        self.get(&key)
            .and_then(|e| e.cooldown_until)
            .filter(|&until| until > now_ms)
    }

    pub fn is_cooling_down(&self, token_id: &str, model_group: &str, now_ms: u64) -> bool {
        self.cooldown_until(token_id, model_group, now_ms).is_some()
    }

    /// Drop cooldown windows that ended at or before `now_ms`. Returns how many were cleared.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut cleared = 0;
        for entry in entries.values_mut() {
            if entry.cooldown_until.is_some_and(|until| until <= now_ms) {
                entry.cooldown_until = None;
                cleared += 1;
            }
        }
        entries.retain(|_, e| e.cooldown_until.is_some() || e.has_quota_data);
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QuotaStore for CooldownRegistry {
    fn model_group_reset_time(&self, token_id: &str, model_group: &str) -> GroupResetTime {
        match self.get(&CooldownKey::new(token_id, model_group)) {
            Some(entry) => GroupResetTime {
                reset_time: entry.quota_reset_at,
                has_data: entry.has_quota_data,
            },
            None => GroupResetTime::default(),
        }
    }

    fn set_cooldown(&self, token_id: &str, model_group: &str, reset_at_ms: u64) {
        self.with_entry(token_id, model_group, |entry| {
            entry.cooldown_until = Some(reset_at_ms);
            entry.escalations = entry.escalations.saturating_add(1);
            entry.last_escalated_at = Some(Instant::now());
        });
    }
}
