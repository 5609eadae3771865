//! `agw classify` – run the error signal extractor over a captured body.

use anyhow::{Context, Result};
use agw_core::retry::{self, ErrorSignal, UpstreamError};
use serde_json::json;
use std::io::Read;
use std::path::Path;

pub fn run_classify(status: Option<u16>, file: Option<&Path>) -> Result<()> {
    let body = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading error body from stdin")?;
            buf
        }
    };
    let signal = retry::extract(&as_upstream_error(status, body));
    println!("{}", serde_json::to_string_pretty(&signal_json(&signal))?);
    Ok(())
}

fn as_upstream_error(status: Option<u16>, body: String) -> UpstreamError {
    match status {
        Some(status) => UpstreamError::api(status, body),
        None => UpstreamError::Other(body),
    }
}

pub(crate) fn signal_json(signal: &ErrorSignal) -> serde_json::Value {
    json!({
        "http_status": signal.http_status,
        "class": format!("{:?}", signal.class()),
        "retryable": signal.retryable,
        "explicit_delay_ms": signal.explicit_delay_ms(),
        "reset_at_ms": signal.reset_at_ms,
        "reason": signal.reason,
    })
}
