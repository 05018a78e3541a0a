// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `ewire` isolated from the user's config, socket and buffer.
pub fn ewire(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ewire");
    cmd.env("EVENTWIRE_ENDPOINT", temp.path().join("svc.sock"))
        .env("EVENTWIRE_BUFFER_DIR", temp.path().join("buffer"))
        .env("EVENTWIRE_CONFIG", temp.path().join("config.toml"))
        .env_remove("EVENTWIRE_LOG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Write settings that make connection failures quick.
pub fn write_fast_config(temp: &TempDir) {
    std::fs::write(
        temp.path().join("config.toml"),
        "[transport]\nauto_reconnect = false\nconnect_timeout_ms = 500\n",
    )
    .unwrap();
}

pub fn buffer_files(temp: &TempDir) -> Vec<String> {
    let dir = temp.path().join("buffer");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn write_buffer(temp: &TempDir, name: &str, content: &str) {
    let dir = temp.path().join("buffer");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}
