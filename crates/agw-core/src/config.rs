use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{RetryPolicy, MAX_JITTER_RATIO};
use crate::stream::{SessionConfig, MAX_HEARTBEAT_INTERVAL};

/// Retry loop parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 means a single invocation.
    pub max_retries: u32,
    /// Delay before the first retry, doubled per attempt.
    pub base_delay_ms: u64,
    /// Hard ceiling on any single wait.
    pub max_delay_ms: u64,
    /// Symmetric jitter as a fraction of the computed delay, in `0.0..=0.99`.
    pub jitter_ratio: f64,
    /// Added on top of an upstream-provided delay.
    pub hint_buffer_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 20_000,
            jitter_ratio: 0.2,
            hint_buffer_ms: 50,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=MAX_JITTER_RATIO).contains(&self.jitter_ratio) {
            anyhow::bail!(
                "retry.jitter_ratio must be between 0.0 and {}, got {}",
                MAX_JITTER_RATIO,
                self.jitter_ratio
            );
        }
        Ok(())
    }

    /// Build the runtime policy. An out-of-range jitter ratio is clamped the
    /// same way [`RetryPolicy`] clamps it.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_ratio: if self.jitter_ratio.is_finite() {
                self.jitter_ratio.clamp(0.0, MAX_JITTER_RATIO)
            } else {
                0.0
            },
            hint_buffer: Duration::from_millis(self.hint_buffer_ms),
        }
    }
}

/// `[cooldown]`: when a rate limit becomes a blocking cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Rate limits whose delay reaches this many seconds escalate.
    pub threshold_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            threshold_secs: 300,
        }
    }
}

impl CooldownConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }
}

/// `[streaming]`: event stream delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Between 1 second and one day; values outside are clamped.
    pub heartbeat_interval_secs: u64,
    /// Frames buffered between a session and its HTTP body.
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 15,
            channel_capacity: 32,
        }
    }
}

impl StreamingConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs)
                .clamp(Duration::from_secs(1), MAX_HEARTBEAT_INTERVAL),
        }
    }
}

/// `[pool]`: idle chunk objects kept for reuse. 0 disables pooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_chunks: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_chunks: 256 }
    }
}

/// Global configuration loaded from `~/.config/agw/config.toml`.
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub retry: RetryConfig,
    pub cooldown: CooldownConfig,
    pub streaming: StreamingConfig,
    pub pool: PoolConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("agw")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GatewayConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GatewayConfig::default();
        write_default(&path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. The file must exist.
pub fn load_from_path(path: &Path) -> Result<GatewayConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: GatewayConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    cfg.retry
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

fn write_default(path: &Path, cfg: &GatewayConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.retry.base_delay_ms, 500);
        assert_eq!(cfg.retry.max_delay_ms, 20_000);
        assert_eq!(cfg.cooldown.threshold_secs, 300);
        assert_eq!(cfg.streaming.heartbeat_interval_secs, 15);
        assert_eq!(cfg.pool.max_chunks, 256);
    }

    #[test]
    fn defaults_match_the_runtime_types() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.retry.to_policy(), RetryPolicy::default());
        assert_eq!(cfg.streaming.session_config(), SessionConfig::default());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = GatewayConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: GatewayConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let toml = r#"
            [retry]
            max_retries = 5
            jitter_ratio = 0.0

            [cooldown]
            threshold_secs = 60
        "#;
        let cfg: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.base_delay_ms, 500);
        assert_eq!(cfg.retry.jitter_ratio, 0.0);
        assert_eq!(cfg.cooldown.threshold(), Duration::from_secs(60));
        assert_eq!(cfg.streaming, StreamingConfig::default());
        assert_eq!(cfg.pool, PoolConfig::default());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, GatewayConfig::default());
    }

    #[test]
    fn out_of_range_jitter_is_clamped() {
        let cfg = RetryConfig {
            jitter_ratio: 3.0,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.to_policy().jitter_ratio, MAX_JITTER_RATIO);
    }

    #[test]
    fn load_from_path_rejects_out_of_range_jitter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\njitter_ratio = 1.5\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("jitter_ratio"));
    }

    #[test]
    fn huge_heartbeat_is_capped() {
        let cfg = StreamingConfig {
            heartbeat_interval_secs: u64::MAX,
            ..StreamingConfig::default()
        };
        assert_eq!(cfg.session_config().heartbeat_interval, MAX_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn zero_heartbeat_is_raised_to_one_second() {
        let cfg = StreamingConfig {
            heartbeat_interval_secs: 0,
            ..StreamingConfig::default()
        };
        assert_eq!(cfg.session_config().heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pool]\nmax_chunks = 0\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.pool.max_chunks, 0);
    }

    #[test]
    fn load_from_path_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn write_default_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default(&path, &GatewayConfig::default()).unwrap();
        assert_eq!(load_from_path(&path).unwrap(), GatewayConfig::default());
    }
}
