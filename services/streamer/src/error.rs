//! Streamer error types

use serde::Serialize;
use thiserror::Error;

/// Errors raised while building or running sites
#[derive(Debug, Error)]
pub enum StreamerError {
    /// A site whose layout cannot be run; fatal to that site only
    #[error("Configuration error in site '{site}': {message}")]
    Configuration { site: String, message: String },
}

impl StreamerError {
    pub fn configuration(site: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            site: site.into(),
            message: message.into(),
        }
    }
}

/// Why a frame was not queued for a channel
///
/// None of these are failures of the renderer. The frame is simply dropped
/// and counted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EnqueueRejected {
    /// No connection exists and the previous attempt was too recent
    #[error("Too early to retry, last attempt {elapsed_ms}ms ago")]
    RetryBackoff { elapsed_ms: u64 },

    #[error("Queue full at {depth} packets, frame discarded")]
    QueueOverflow { depth: usize },

    /// The channel has been stopped
    #[error("Channel stopped")]
    Disabled,

    #[error("Slice {offset}+{length} outside buffer of {buffer_len} pixels")]
    OutOfBounds {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },
}

impl EnqueueRejected {
    /// Category for logging and counters
    pub fn category(&self) -> &'static str {
        match self {
            EnqueueRejected::RetryBackoff { .. } => "retry_backoff",
            EnqueueRejected::QueueOverflow { .. } => "queue_overflow",
            EnqueueRejected::Disabled => "disabled",
            EnqueueRejected::OutOfBounds { .. } => "out_of_bounds",
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamerError>;
