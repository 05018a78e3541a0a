// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Generates `env_vars.rs`: one documented constant per environment
//! variable the CLI reads directly.

use std::fmt::Write as _;
use std::path::Path;

const VARS: &[(&str, &str)] = &[
    ("EVENTWIRE_LOG_FILE", "Append logs to this file instead of stderr."),
    ("RUST_LOG", "Log filter directives; overrides `-v`."),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut contents = String::new();
    for (name, doc) in VARS {
        writeln!(contents, "/// Environment variable: {doc}")?;
        writeln!(contents, "pub const {name}: &str = \"{name}\";")?;
    }

    let out_dir = std::env::var("OUT_DIR")?;
    std::fs::write(Path::new(&out_dir).join("env_vars.rs"), contents)?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
