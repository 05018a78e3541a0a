// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local address of the activity service.
//!
//! Unix-like systems use a socket file in the temp directory; Windows uses a
//! named pipe. Both embed the user ID so users on a shared machine never
//! reach each other's service.

use std::fmt;
use std::path::PathBuf;

use crate::identity::user_id;

/// Name prefix shared by the socket file and the named pipe.
const ENDPOINT_PREFIX: &str = "eventwire";

/// Where the service listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Filesystem socket path.
    Socket(PathBuf),
    /// Windows named pipe, e.g. `\\.\pipe\eventwire-alice`.
    Pipe(String),
}

impl Endpoint {
    /// Default endpoint for the current user on this platform.
    pub fn for_user() -> Self {
        Self::for_user_id(&user_id())
    }

    /// Default endpoint for the given user on this platform.
    pub fn for_user_id(user: &str) -> Self {
        if cfg!(windows) {
            Endpoint::Pipe(format!(r"\\.\pipe\{}-{}", ENDPOINT_PREFIX, user))
        } else {
            Endpoint::Socket(std::env::temp_dir().join(format!("{}-{}.sock", ENDPOINT_PREFIX, user)))
        }
    }

    /// Parses a configured address. Pipe names start with `\\.\pipe\`;
    /// anything else is a socket path.
    pub fn parse(address: &str) -> Self {
        if address.starts_with(r"\\.\pipe\") {
            Endpoint::Pipe(address.to_string())
        } else {
            Endpoint::Socket(PathBuf::from(address))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket(path) => write!(f, "{}", path.display()),
            Endpoint::Pipe(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
