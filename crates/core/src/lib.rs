// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ew-core: client side of the eventwire activity pipeline
//!
//! Raw editor and terminal activity flows through a [`TrafficShaper`] that
//! filters, rate limits, debounces, deduplicates and batches it, then through
//! a [`Transport`] that delivers it to the local service over NDJSON,
//! buffering on disk whenever the service is unreachable.

pub mod config;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod event;
pub mod identity;
pub mod pipeline;
pub mod shaper;
pub mod transport;

pub use config::{Settings, ShaperConfig, TransportConfig, TransportSettings};
pub use endpoint::Endpoint;
pub use error::{BufferError, BufferResult, ConfigError, TransportError, TransportResult};
pub use event::{ActivityEvent, ShapedEvent, ShapedOutput};
pub use pipeline::{ForwardStats, Pipeline, PipelineHandle};
pub use shaper::{ShaperStats, TrafficShaper};
pub use transport::{
    ConnectionState, Connector, Delivery, DrainReport, DurableBuffer, Transport, TransportEvent,
};

pub use ew_protocol as protocol;
