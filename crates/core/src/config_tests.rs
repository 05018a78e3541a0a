// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn empty_file_yields_defaults() {
    let settings = Settings::parse("").unwrap();

    assert!(settings.endpoint.is_none());
    assert!(settings.transport.auto_reconnect);
    assert_eq!(settings.transport.reconnect_delay_ms, 1_000);
    assert_eq!(settings.transport.max_reconnect_attempts, 10);
    assert_eq!(settings.transport.connect_timeout_ms, 5_000);
    assert_eq!(settings.transport.request_timeout_ms, 30_000);
    assert_eq!(settings.transport.max_buffer_size, 10 * 1024 * 1024);
    assert_eq!(settings.shaper.max_events_per_second, 10);
    assert_eq!(settings.shaper.debounce_delay_ms, 500);
    assert_eq!(settings.shaper.dedupe_window_ms, 1_000);
    assert_eq!(settings.shaper.max_batch_size, 50);
    assert_eq!(settings.shaper.batch_window_ms, 100);
}

#[test]
fn partial_tables_keep_other_defaults() {
    let settings = Settings::parse(
        r#"
endpoint = "/tmp/custom.sock"

[transport]
auto_reconnect = false
heartbeat_timeout_ms = 0

[shaper]
max_events_per_second = 5
ignore_patterns = ["*.tmp"]
"#,
    )
    .unwrap();

    assert_eq!(settings.endpoint.as_deref(), Some("/tmp/custom.sock"));
    assert!(!settings.transport.auto_reconnect);
    assert_eq!(settings.transport.reconnect_delay_ms, 1_000);
    assert_eq!(settings.shaper.max_events_per_second, 5);
    assert_eq!(settings.shaper.ignore_patterns, vec!["*.tmp"]);
    assert!(settings.shaper.debounce_enabled);

    let config = TransportConfig::with_paths(
        &settings.transport,
        Endpoint::parse("/tmp/custom.sock"),
        PathBuf::from("/tmp/buf"),
    );
    assert_eq!(config.heartbeat_timeout, None);
}

#[parameterized(
    zero_batch = { "[shaper]\nmax_batch_size = 0", "max_batch_size" },
    zero_buffer = { "[transport]\nmax_buffer_size = 0", "max_buffer_size" },
    blank_client = { "[transport]\nclient_name = \"  \"", "client_name" },
)]
fn invalid_values_rejected(content: &str, field: &str) {
    let err = Settings::parse(content).unwrap_err();
    assert!(err.to_string().contains(field));
}

#[test]
fn load_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Settings::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn load_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[transport]\nmax_reconnect_attempts = 3\n").unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.transport.max_reconnect_attempts, 3);
}

#[parameterized(
    first = { 1, 100 },
    second = { 2, 200 },
    fifth = { 5, 500 },
    capped = { 9, 500 },
)]
fn backoff_scales_with_attempt(attempt: u32, expected_ms: u64) {
    let settings = TransportSettings {
        reconnect_delay_ms: 100,
        ..TransportSettings::default()
    };
    let config = TransportConfig::with_paths(
        &settings,
        Endpoint::for_user_id("t"),
        PathBuf::from("/tmp"),
    );
    assert_eq!(config.backoff(attempt), Duration::from_millis(expected_ms));
}

#[test]
fn huge_reconnect_delay_saturates() {
    let settings = TransportSettings {
        reconnect_delay_ms: u64::MAX,
        ..TransportSettings::default()
    };
    let config = TransportConfig::with_paths(
        &settings,
        Endpoint::for_user_id("t"),
        PathBuf::from("/tmp"),
    );
    assert_eq!(config.backoff(5), MAX_RECONNECT_DELAY);
    assert_eq!(config.backoff(u32::MAX), MAX_RECONNECT_DELAY);
}

#[test]
fn passthrough_disables_every_stage() {
    let config = ShaperConfig::passthrough();
    assert!(!config.ignore_enabled);
    assert!(!config.rate_limit_enabled);
    assert!(!config.debounce_enabled);
    assert!(!config.dedupe_enabled);
    assert!(!config.batch_enabled);
}
