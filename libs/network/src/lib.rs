//! Device Network Infrastructure
//!
//! Raw TCP plumbing between the streamer and its LED controllers: one shared
//! connection per controller host, connect-with-cooldown, combined batch
//! writes and opportunistic telemetry reads.
//!
//! ## Architecture Role
//!
//! ```text
//! services/streamer (channel workers)
//!          │ get_or_create / remove
//!          ▼
//!  ConnectionRegistry ──▶ DeviceConnection ──TCP──▶ controller :49152
//!                              ▲                         │
//!                              └──── TelemetryResponse ◀─┘
//! ```

pub mod error;
pub mod transports;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use transports::{
    ConnectionConfig, ConnectionRegistry, ConnectionStats, DeviceConnection, MetricsSnapshot,
    SendReport, DEFAULT_DEVICE_PORT,
};
