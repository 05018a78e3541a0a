// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable offline buffer.
//!
//! While disconnected, each outgoing envelope is appended as one NDJSON line
//! to `buffer-{session_id}.jsonl` and synced to disk. When the active file
//! reaches the size limit it is renamed to `buffer-{session_id}.jsonl.bak`,
//! replacing any earlier backup, so each session holds at most two files.
//!
//! Files left behind by other sessions (crashed or exited clients) are
//! orphans and are replayed by whichever client connects next.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ew_protocol::framing::write_envelope;
use ew_protocol::Envelope;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BufferResult;

const FILE_PREFIX: &str = "buffer-";
const ACTIVE_SUFFIX: &str = ".jsonl";
const BACKUP_SUFFIX: &str = ".jsonl.bak";

/// Totals from one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Sessions whose files were replayed.
    pub sessions: usize,
    /// Files fully replayed and deleted.
    pub files: usize,
    /// Envelopes written to the socket.
    pub sent: usize,
    /// Malformed lines skipped.
    pub skipped: usize,
}

impl DrainReport {
    pub fn merge(&mut self, other: DrainReport) {
        self.sessions += other.sessions;
        self.files += other.files;
        self.sent += other.sent;
        self.skipped += other.skipped;
    }
}

/// One buffer file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFile {
    pub path: PathBuf,
    pub session_id: String,
    pub backup: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// The buffer files of one session, backup first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub session_id: String,
    pub files: Vec<BufferFile>,
}

impl SessionFiles {
    /// Oldest modification time among the session's files.
    pub fn modified(&self) -> SystemTime {
        self.files
            .iter()
            .map(|f| f.modified)
            .min()
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

/// Offline buffer for one session.
#[derive(Debug, Clone)]
pub struct DurableBuffer {
    dir: PathBuf,
    session_id: String,
    max_size: u64,
}

impl DurableBuffer {
    pub fn new(dir: impl Into<PathBuf>, session_id: impl Into<String>, max_size: u64) -> Self {
        DurableBuffer {
            dir: dir.into(),
            session_id: session_id.into(),
            max_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(active_name(&self.session_id))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(backup_name(&self.session_id))
    }

    /// Append an envelope, rotating first if it would not fit in the active file.
    ///
    /// The line is synced to disk before returning.
    pub fn append(&self, envelope: &Envelope) -> BufferResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mut line = Vec::new();
        write_envelope(&mut line, envelope)?;
        self.rotate_if_full(line.len() as u64)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Move the active file over the backup if appending `incoming` more
    /// bytes would take it past the size limit. A file that is still empty
    /// is never rotated, so a single oversized line lands on its own.
    ///
    /// Returns true if a rotation happened.
    pub fn rotate_if_full(&self, incoming: u64) -> BufferResult<bool> {
        let active = self.active_path();
        let size = match fs::metadata(&active) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if size == 0 || size.saturating_add(incoming) <= self.max_size {
            return Ok(false);
        }
        remove_file(&self.backup_path())?;
        fs::rename(&active, self.backup_path())?;
        info!(session = %self.session_id, size, "rotated offline buffer");
        Ok(true)
    }

    /// This session's files, if any.
    pub fn current(&self) -> BufferResult<Option<SessionFiles>> {
        Ok(sessions(&self.dir)?
            .into_iter()
            .find(|s| s.session_id == self.session_id))
    }

    /// Files of every other session, oldest session first.
    pub fn orphans(&self) -> BufferResult<Vec<SessionFiles>> {
        let mut orphans: Vec<SessionFiles> = sessions(&self.dir)?
            .into_iter()
            .filter(|s| s.session_id != self.session_id)
            .collect();
        orphans.sort_by_key(SessionFiles::modified);
        Ok(orphans)
    }

    /// True if any session, this one included, has a non-empty buffer file.
    pub fn has_pending(&self) -> BufferResult<bool> {
        Ok(list_files(&self.dir)?.iter().any(|f| f.size > 0))
    }
}

/// Every buffer file in `dir`. A missing directory holds no files.
pub fn list_files(dir: &Path) -> BufferResult<Vec<BufferFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some((session_id, backup)) = name.to_str().and_then(parse_file_name) else {
            continue;
        };
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        files.push(BufferFile {
            path: entry.path(),
            session_id,
            backup,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Buffer files grouped by session, each with its backup ahead of the
/// active file.
pub fn sessions(dir: &Path) -> BufferResult<Vec<SessionFiles>> {
    let mut sessions: Vec<SessionFiles> = Vec::new();
    for file in list_files(dir)? {
        match sessions.iter_mut().find(|s| s.session_id == file.session_id) {
            Some(session) => session.files.push(file),
            None => sessions.push(SessionFiles {
                session_id: file.session_id.clone(),
                files: vec![file],
            }),
        }
    }
    for session in &mut sessions {
        session.files.sort_by_key(|f| !f.backup);
    }
    Ok(sessions)
}

/// Contents of a buffer file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferLines {
    /// Non-blank lines, in file order.
    pub lines: Vec<String>,
    /// Lines that were not valid UTF-8, such as one torn by a crash mid-append.
    pub invalid: usize,
}

/// Read a buffer file line by line. A missing file is empty.
pub fn read_lines(path: &Path) -> BufferResult<BufferLines> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BufferLines::default()),
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let mut contents = BufferLines::default();
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        match String::from_utf8(std::mem::take(&mut raw)) {
            Ok(line) => {
                let line = line.trim_end_matches(['\n', '\r']);
                if !line.trim().is_empty() {
                    contents.lines.push(line.to_string());
                }
            }
            Err(_) => {
                warn!(file = %path.display(), "skipping buffered line that is not UTF-8");
                contents.invalid += 1;
            }
        }
    }
    Ok(contents)
}

/// Replace a file's contents with the given lines.
///
/// Used when a drain stops partway so the unsent tail survives.
pub fn rewrite_lines(path: &Path, lines: &[String]) -> BufferResult<()> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.sync_all()?;
    Ok(())
}

/// Delete a file, treating an already-missing file as success.
pub fn remove_file(path: &Path) -> BufferResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn active_name(session_id: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, session_id, ACTIVE_SUFFIX)
}

fn backup_name(session_id: &str) -> String {
    format!("{}{}{}", FILE_PREFIX, session_id, BACKUP_SUFFIX)
}

/// Splits `buffer-{session}.jsonl[.bak]` into the session id and whether it
/// is the backup.
fn parse_file_name(name: &str) -> Option<(String, bool)> {
    let rest = name.strip_prefix(FILE_PREFIX)?;
    let (session, backup) = match rest.strip_suffix(BACKUP_SUFFIX) {
        Some(session) => (session, true),
        None => (rest.strip_suffix(ACTIVE_SUFFIX)?, false),
    };
    if session.is_empty() {
        return None;
    }
    Some((session.to_string(), backup))
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
