// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited framing over std readers and writers.

use std::io::{BufRead, Write};

use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result};

/// Maximum size of a single line (1MB) to stop a runaway peer from
/// exhausting memory.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Writes one envelope followed by `\n`.
pub fn write_envelope<W: Write>(writer: &mut W, envelope: &Envelope) -> Result<()> {
    writer.write_all(envelope.to_line()?.as_bytes())?;
    Ok(())
}

/// Iterates the envelopes of an NDJSON stream, skipping blank lines.
///
/// A malformed line yields an error item; iteration continues with the next
/// line.
pub fn read_envelopes<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Envelope>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Envelope::from_line(&line)),
        Err(e) => Some(Err(ProtocolError::Io(e))),
    })
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
