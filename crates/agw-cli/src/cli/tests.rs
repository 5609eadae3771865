//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_classify_with_status_and_file() {
    match parse(&["agw", "classify", "--status", "429", "err.json"]).command {
        CliCommand::Classify { status, file } => {
            assert_eq!(status, Some(429));
            assert_eq!(file, Some(PathBuf::from("err.json")));
        }
        _ => panic!("expected Classify"),
    }
}

#[test]
fn cli_parse_classify_from_stdin() {
    match parse(&["agw", "classify"]).command {
        CliCommand::Classify { status, file } => {
            assert!(status.is_none());
            assert!(file.is_none());
        }
        _ => panic!("expected Classify"),
    }
}

#[test]
fn cli_parse_backoff_defaults() {
    match parse(&["agw", "backoff"]).command {
        CliCommand::Backoff { hint_ms, attempts } => {
            assert!(hint_ms.is_none());
            assert_eq!(attempts, 3);
        }
        _ => panic!("expected Backoff"),
    }
}

#[test]
fn cli_parse_backoff_with_hint() {
    match parse(&["agw", "backoff", "--hint-ms", "1500", "--attempts", "6"]).command {
        CliCommand::Backoff { hint_ms, attempts } => {
            assert_eq!(hint_ms, Some(1500));
            assert_eq!(attempts, 6);
        }
        _ => panic!("expected Backoff"),
    }
}

#[test]
fn cli_parse_stream_demo() {
    match parse(&["agw", "stream-demo", "--chunks", "2", "--interval-ms", "0"]).command {
        CliCommand::StreamDemo {
            chunks,
            interval_ms,
        } => {
            assert_eq!(chunks, 2);
            assert_eq!(interval_ms, 0);
        }
        _ => panic!("expected StreamDemo"),
    }
}

#[test]
fn cli_parse_global_config_after_subcommand() {
    let cli = parse(&["agw", "config", "--config", "/tmp/agw.toml"]);
    assert!(matches!(cli.command, CliCommand::Config));
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/agw.toml")));
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["agw", "download"]).is_err());
}
