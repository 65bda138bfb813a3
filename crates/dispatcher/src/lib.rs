//! # Dispatcher
//!
//! Per-tick dispatch of frames and landmarks to UDP sinks.
//!
//! Responsibilities:
//! - Sink registry with contiguous indices and versioned snapshots
//! - Cadence gate: at most one detection per kind per tick
//! - Last-good cache per sink, invalidated on reindex
//! - Fire-and-forget datagram sends

pub mod cache;
pub mod cadence;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod registry;
pub mod transport;

pub use cache::LastGoodCache;
pub use cadence::CadenceGate;
pub use contracts::{ConfigSnapshot, DatagramTransport, SinkConfig, TickReport};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use payload::{InfoPayload, StreamEntry};
pub use registry::SinkRegistry;
pub use transport::{Datagram, MemoryTransport, UdpTransport, MAX_DATAGRAM};
