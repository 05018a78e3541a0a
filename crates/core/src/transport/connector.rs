// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection establishment.
//!
//! The [`Connector`] trait abstracts over how a byte stream to the service is
//! opened, so tests can substitute in-memory pipes for the local socket.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::endpoint::Endpoint;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open, bidirectional byte stream split into its halves.
pub struct Link {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Link {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Link {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens connections to the service.
pub trait Connector: Send + Sync + 'static {
    /// Open a new stream.
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<Link>> + Send + '_>>;

    /// Address shown in logs.
    fn describe(&self) -> String;
}

/// Connects to the service's Unix domain socket or Windows named pipe.
#[derive(Debug, Clone)]
pub struct LocalSocketConnector {
    endpoint: Endpoint,
}

impl LocalSocketConnector {
    pub fn new(endpoint: Endpoint) -> Self {
        LocalSocketConnector { endpoint }
    }
}

impl Connector for LocalSocketConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<Link>> + Send + '_>> {
        Box::pin(async move {
            match &self.endpoint {
                Endpoint::Socket(path) => connect_socket(path).await,
                Endpoint::Pipe(name) => connect_pipe(name).await,
            }
        })
    }

    fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

#[cfg(unix)]
async fn connect_socket(path: &std::path::Path) -> io::Result<Link> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Link::new(stream))
}

#[cfg(not(unix))]
async fn connect_socket(path: &std::path::Path) -> io::Result<Link> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("unix sockets are not available here: {}", path.display()),
    ))
}

#[cfg(windows)]
async fn connect_pipe(name: &str) -> io::Result<Link> {
    let client = tokio::net::windows::named_pipe::ClientOptions::new().open(name)?;
    Ok(Link::new(client))
}

#[cfg(not(windows))]
async fn connect_pipe(name: &str) -> io::Result<Link> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("named pipes are only available on windows: {}", name),
    ))
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
