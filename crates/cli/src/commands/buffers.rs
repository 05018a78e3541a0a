// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! List offline buffer files without connecting.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use ew_core::transport::{list_files, BufferFile};
use serde::Serialize;

use super::{format_size, print_json, Context};
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct BufferListing {
    pub dir: PathBuf,
    pub files: Vec<BufferEntry>,
    pub total_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct BufferEntry {
    pub session_id: String,
    pub path: PathBuf,
    pub backup: bool,
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl From<BufferFile> for BufferEntry {
    fn from(file: BufferFile) -> Self {
        BufferEntry {
            session_id: file.session_id,
            path: file.path,
            backup: file.backup,
            size: file.size,
            modified: file.modified.into(),
        }
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    let listing = listing(ctx)?;
    if ctx.is_json() {
        print_json(&listing)
    } else {
        print!("{}", format_listing(&listing));
        Ok(())
    }
}

pub fn listing(ctx: &Context) -> Result<BufferListing> {
    let dir = ctx.transport.buffer_dir.clone();
    let mut files: Vec<BufferEntry> = list_files(&dir)?.into_iter().map(Into::into).collect();
    files.sort_by(|a, b| a.modified.cmp(&b.modified).then(b.backup.cmp(&a.backup)));
    let total_bytes = files.iter().map(|f| f.size).sum();
    Ok(BufferListing {
        dir,
        files,
        total_bytes,
    })
}

pub fn format_listing(listing: &BufferListing) -> String {
    if listing.files.is_empty() {
        return format!("no buffered events in {}\n", listing.dir.display());
    }
    let mut out = String::new();
    for file in &listing.files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<48} {:>10}  {}\n",
            name,
            format_size(file.size),
            file.modified.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out.push_str(&format!(
        "{} files, {} in {}\n",
        listing.files.len(),
        format_size(listing.total_bytes),
        listing.dir.display()
    ));
    out
}

#[cfg(test)]
#[path = "buffers_tests.rs"]
mod tests;
