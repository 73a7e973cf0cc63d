//! Device Transports
//!
//! TCP connections to LED controllers, the registry that shares them
//! between channels, and the throughput metrics they report.

pub mod metrics;
pub mod registry;
pub mod tcp;

#[cfg(test)]
mod tests;

pub use metrics::{MetricsSnapshot, MetricsTracker, ThroughputMeter};
pub use registry::ConnectionRegistry;
pub use tcp::{
    ConnectAttempts, ConnectionConfig, ConnectionStats, DeviceConnection, SendReport,
    DEFAULT_DEVICE_PORT,
};
