//! # LED Frame Codec
//!
//! ## Purpose
//!
//! Byte-level encoding between rendered pixels and what a controller
//! accepts on its socket:
//! - zlib-compatible container (header, raw DEFLATE body, Adler-32 trailer)
//! - Compressed packet envelope with raw fallback
//! - Pixel slice extraction with reverse and red/green swap transforms
//! - Device frame encoders, including the stock pixel data command
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → network/
//!     ↑           ↓          ↓
//!   Crgb      Frames &    Device
//!   Pixels    Envelopes   Sockets
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Sockets or queues (belongs in network/ and the streamer service)
//! - Rendering (belongs in the streamer's effects)

pub mod checksum;
pub mod colors;
pub mod container;
pub mod envelope;
pub mod error;
pub mod frame;

pub use checksum::{adler32, Adler32};
pub use colors::{color_bytes_at_offset, colors_from_bytes};
pub use container::{CompressionLevel, ContainerEncoder, ContainerHeader};
pub use envelope::{
    open_packet, parse_envelope, EnvelopeHeader, Packet, PacketBuilder, COMPRESSED_TAG,
    ENVELOPE_HEADER_SIZE, ENVELOPE_RESERVED,
};
pub use error::{CodecError, Result};
pub use frame::{
    FrameEncoder, PixelDataEncoder, PixelDataHeader, PIXEL_DATA_HEADER_SIZE, WIFI_COMMAND_PIXELDATA64,
};
