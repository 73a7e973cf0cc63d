//! # Shared Pixel Types
//!
//! Plain data structures that every layer of the LED streaming pipeline agrees on.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → libs/codec → libs/network → services/streamer
//!     ↑            ↓             ↓               ↓
//!  Crgb,       Container,     Device          Sites, channels,
//!  PixelBuffer Envelope       connections     schedulers
//!  Telemetry
//! ```
//!
//! ## What This Crate Contains
//! - [`Crgb`]: a 3-byte color triplet with the blend/fade arithmetic effects rely on
//! - [`PixelBuffer`]: the fixed-length, lock-protected master buffer of a site
//! - [`TelemetryResponse`]: the fixed-layout status record devices send back
//!
//! ## What This Crate Does NOT Contain
//! - Compression or wire framing (belongs in `codec`)
//! - Socket management (belongs in `network`)

pub mod color;
pub mod pixels;
pub mod telemetry;

pub use color::Crgb;
pub use pixels::PixelBuffer;
pub use telemetry::{TelemetryResponse, TELEMETRY_RESPONSE_SIZE};
