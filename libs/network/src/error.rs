//! Transport Error Types
//!
//! Connection and transmission failures for device sockets. None of these
//! are fatal to the process: channel workers log them, drop the affected
//! connection and retry on a later iteration.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Device transport error
#[derive(Error, Debug)]
pub enum TransportError {
    /// Host name did not resolve to any address
    #[error("Failed to resolve {host}: {message}")]
    Resolve {
        host: String,
        message: String,
        source: Option<std::io::Error>,
    },

    /// TCP connect failed or timed out
    #[error("Connection error: {message} (host: {host}, remote: {remote_addr:?})")]
    Connection {
        host: String,
        message: String,
        remote_addr: Option<SocketAddr>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connect attempted again before the per-host cooldown expired
    #[error("Connect to {host} blocked by cooldown: {elapsed_ms}ms since last attempt, need {cooldown_ms}ms")]
    Cooldown {
        host: String,
        elapsed_ms: u64,
        cooldown_ms: u64,
    },

    /// Connection was marked dead by an earlier failure
    #[error("Connection to {host} is dead")]
    Dead { host: String },

    /// Write to the device failed
    #[error("Transmission error to {host}: {message}")]
    Transmission {
        host: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Device accepted fewer bytes than were sent
    #[error("Short write to {host}: wrote {written} of {expected} bytes")]
    ShortWrite {
        host: String,
        written: usize,
        expected: usize,
    },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a resolution error
    pub fn resolve(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            host: host.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a resolution error with source
    pub fn resolve_with_source(
        host: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Resolve {
            host: host.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a connection error
    pub fn connection(
        host: impl Into<String>,
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        host: impl Into<String>,
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
            remote_addr,
            source: Some(Box::new(source)),
        }
    }

    /// Create a cooldown error
    pub fn cooldown(host: impl Into<String>, elapsed: Duration, cooldown: Duration) -> Self {
        Self::Cooldown {
            host: host.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            cooldown_ms: cooldown.as_millis() as u64,
        }
    }

    /// Create a dead-connection error
    pub fn dead(host: impl Into<String>) -> Self {
        Self::Dead { host: host.into() }
    }

    /// Create a transmission error
    pub fn transmission(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transmission {
            host: host.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transmission error with source
    pub fn transmission_with_source(
        host: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transmission {
            host: host.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a short-write error
    pub fn short_write(host: impl Into<String>, written: usize, expected: usize) -> Self {
        Self::ShortWrite {
            host: host.into(),
            written,
            expected,
        }
    }

    /// Check if a later attempt against the same host might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Resolve { .. } => true,
            TransportError::Connection { .. } => true,
            TransportError::Cooldown { .. } => true,
            TransportError::Dead { .. } => false,
            TransportError::Transmission { .. } => true,
            TransportError::ShortWrite { .. } => true,
            TransportError::Io { .. } => true,
        }
    }

    /// Check if the connection object itself is still usable after this error
    pub fn keeps_connection(&self) -> bool {
        matches!(self, TransportError::Cooldown { .. })
    }

    /// Get error category for logs and counters
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Resolve { .. } => "resolve",
            TransportError::Connection { .. } => "connection",
            TransportError::Cooldown { .. } => "cooldown",
            TransportError::Dead { .. } => "dead",
            TransportError::Transmission { .. } => "transmission",
            TransportError::ShortWrite { .. } => "short_write",
            TransportError::Io { .. } => "io",
        }
    }
}

// Custom Clone implementation since Box<dyn Error> doesn't implement Clone
impl Clone for TransportError {
    fn clone(&self) -> Self {
        match self {
            TransportError::Resolve { host, message, .. } => TransportError::Resolve {
                host: host.clone(),
                message: message.clone(),
                source: None,
            },
            TransportError::Connection {
                host,
                message,
                remote_addr,
                ..
            } => TransportError::Connection {
                host: host.clone(),
                message: message.clone(),
                remote_addr: *remote_addr,
                source: None,
            },
            TransportError::Cooldown {
                host,
                elapsed_ms,
                cooldown_ms,
            } => TransportError::Cooldown {
                host: host.clone(),
                elapsed_ms: *elapsed_ms,
                cooldown_ms: *cooldown_ms,
            },
            TransportError::Dead { host } => TransportError::Dead { host: host.clone() },
            TransportError::Transmission { host, message, .. } => TransportError::Transmission {
                host: host.clone(),
                message: message.clone(),
                source: None,
            },
            TransportError::ShortWrite {
                host,
                written,
                expected,
            } => TransportError::ShortWrite {
                host: host.clone(),
                written: *written,
                expected: *expected,
            },
            TransportError::Io { message, source } => TransportError::Io {
                message: message.clone(),
                source: std::io::Error::new(source.kind(), message.clone()),
            },
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_keeps_connection() {
        let err = TransportError::cooldown(
            "strip1",
            Duration::from_millis(250),
            Duration::from_secs(1),
        );
        assert!(err.keeps_connection());
        assert!(err.is_retryable());
        assert_eq!(err.category(), "cooldown");
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_dead_is_terminal() {
        let err = TransportError::dead("strip1");
        assert!(!err.is_retryable());
        assert!(!err.keeps_connection());
    }

    #[test]
    fn test_clone_drops_source() {
        let err = TransportError::transmission_with_source(
            "strip1",
            "write failed",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"),
        );
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(matches!(cloned, TransportError::Transmission { source: None, .. }));
    }
}
