//! `agw config` – print the effective configuration.

use anyhow::Result;
use agw_core::config::{self, GatewayConfig};
use std::path::Path;

pub fn run_config(cfg: &GatewayConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(cfg)?);
    Ok(())
}
