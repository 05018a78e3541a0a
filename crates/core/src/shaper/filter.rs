// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Glob-style ignore patterns for resource paths.
//!
//! Supported syntax:
//! - `**` matches across directories (`**/node_modules/**`)
//! - `*` matches within one path segment (`*.log`)
//! - `?` matches a single character other than `/`
//!
//! A pattern without `/` matches any single segment of the path, so
//! `*.log` ignores `logs/app.log` and `node_modules` ignores
//! `web/node_modules/react/index.js`.

use regex::Regex;

use crate::error::ConfigError;

/// Compiled set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<(String, Regex)>,
}

impl IgnoreFilter {
    /// Compiles the given glob patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if a pattern cannot be compiled.
    pub fn new(globs: &[String]) -> Result<Self, ConfigError> {
        let patterns = globs
            .iter()
            .filter(|glob| !glob.trim().is_empty())
            .map(|glob| {
                Regex::new(&glob_to_regex(glob))
                    .map(|re| (glob.clone(), re))
                    .map_err(|source| ConfigError::Pattern {
                        pattern: glob.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreFilter { patterns })
    }

    /// Returns the first pattern matching the resource, if any.
    pub fn matching(&self, resource: &str) -> Option<&str> {
        let normalized = resource.replace('\\', "/");
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(&normalized))
            .map(|(glob, _)| glob.as_str())
    }

    /// Returns true if any pattern matches the resource.
    pub fn is_ignored(&self, resource: &str) -> bool {
        self.matching(resource).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Translates a glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let glob = glob.trim().replace('\\', "/");
    let body = translate(&glob);
    if glob.contains('/') {
        format!("^{}$", body)
    } else {
        format!("(^|/){}(/|$)", body)
    }
}

fn translate(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                if chars.get(i) == Some(&'/') {
                    // "**/" may also match zero directories
                    out.push_str("(.*/)?");
                    i += 1;
                } else {
                    out.push_str(".*");
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
