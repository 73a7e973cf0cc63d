//! Codec errors for container decoding and frame extraction
//!
//! Every variant carries enough context to tell a malformed header apart
//! from a damaged payload. Integrity failures (anything that means the bytes
//! were altered in flight) are grouped by [`CodecError::is_integrity_failure`].

use thiserror::Error;

/// Errors raised while encoding or decoding LED frame payloads
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Two-byte container header is not a multiple of 31
    #[error("Container header check failed: {cmf:#04x} {flg:#04x} is not a multiple of 31")]
    HeaderCheck { cmf: u8, flg: u8 },

    /// Header names a method or window size other than deflate with a 32K window
    #[error("Unsupported container method {method} with window info {window_info} (expected method 8, window info 7)")]
    UnsupportedMethod { method: u8, window_info: u8 },

    /// Header asks for a preset dictionary, which devices never use
    #[error("Container requests a preset dictionary, which is not supported")]
    PresetDictionary,

    /// Input ended before the stream or trailer was complete
    #[error("Container truncated: {context}")]
    Truncated { context: String },

    /// Deflate body could not be inflated
    #[error("Corrupt deflate stream: {message}")]
    CorruptStream { message: String },

    /// Bytes remain between the end of the deflate stream and the trailer
    #[error("{extra} bytes of trailing data after the deflate stream")]
    TrailingData { extra: usize },

    /// Adler-32 trailer does not match the inflated data
    #[error("Checksum mismatch: expected {expected:#010x}, calculated {calculated:#010x}")]
    ChecksumMismatch { expected: u32, calculated: u32 },

    /// Inflated output would exceed the configured ceiling
    #[error("Decoded size exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },

    /// Requested pixel range does not fit the source buffer
    #[error("Pixel range {offset}..{end} exceeds buffer of {len} pixels")]
    OutOfBounds { offset: usize, end: usize, len: usize },

    /// Underlying writer failed during compression
    #[error("I/O error during compression: {message}")]
    Io { message: String },
}

impl CodecError {
    /// True when the error means the bytes were damaged rather than misdeclared
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::CorruptStream { .. }
                | Self::TrailingData { .. }
                | Self::ChecksumMismatch { .. }
        )
    }

    /// True when the two-byte header itself was rejected
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::HeaderCheck { .. } | Self::UnsupportedMethod { .. } | Self::PresetDictionary
        )
    }

    /// Short category label for log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::HeaderCheck { .. } | Self::UnsupportedMethod { .. } | Self::PresetDictionary => {
                "format"
            }
            Self::Truncated { .. }
            | Self::CorruptStream { .. }
            | Self::TrailingData { .. }
            | Self::ChecksumMismatch { .. } => "integrity",
            Self::TooLarge { .. } => "limit",
            Self::OutOfBounds { .. } => "bounds",
            Self::Io { .. } => "io",
        }
    }

    pub(crate) fn truncated(context: impl Into<String>) -> Self {
        Self::Truncated {
            context: context.into(),
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
