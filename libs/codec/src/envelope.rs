//! Compressed packet envelope
//!
//! A compressed packet is a fixed 16-byte header followed by a container:
//!
//! ```text
//! ┌──────────┬────────────────┬──────────────┬────────────┬───────────────┐
//! │ tag      │ compressed len │ original len │ reserved   │ container     │
//! │ u32 LE   │ u32 LE         │ u32 LE       │ u32 LE     │ variable      │
//! └──────────┴────────────────┴──────────────┴────────────┴───────────────┘
//! ```
//!
//! The tag is the ASCII word `DAVE` taken as a big-endian u32, so the
//! little-endian bytes on the wire spell `EVAD`. When compression does not shrink the
//! payload the raw bytes are sent instead, untagged.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use tracing::warn;

use crate::container::{self, CompressionLevel};
use crate::error::{CodecError, Result};

/// Envelope tag, little-endian bytes `45 56 41 44`
pub const COMPRESSED_TAG: u32 = 0x4441_5645;
/// Fixed value of the reserved header word
pub const ENVELOPE_RESERVED: u32 = 0x1234_5678;
/// Size of the envelope header
pub const ENVELOPE_HEADER_SIZE: usize = 16;

/// Parsed envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub compressed_len: u32,
    pub original_len: u32,
    pub reserved: u32,
}

impl EnvelopeHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        // Writes into a Vec cannot fail
        let _ = out.write_u32::<LittleEndian>(COMPRESSED_TAG);
        let _ = out.write_u32::<LittleEndian>(self.compressed_len);
        let _ = out.write_u32::<LittleEndian>(self.original_len);
        let _ = out.write_u32::<LittleEndian>(self.reserved);
    }
}

/// A packet ready for the device queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub bytes: Bytes,
    /// True when `bytes` is an envelope rather than the raw payload
    pub compressed: bool,
    /// Size of the payload before any compression
    pub original_len: usize,
}

impl Packet {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds device packets, compressing when it pays off
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketBuilder {
    level: CompressionLevel,
}

impl PacketBuilder {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Produce the bytes to send for `payload`
    ///
    /// With `compress` false the payload is passed through. Otherwise the
    /// envelope is returned only when strictly smaller than the payload.
    pub fn build(&self, payload: &[u8], compress: bool) -> Packet {
        let raw = || Packet {
            bytes: Bytes::copy_from_slice(payload),
            compressed: false,
            original_len: payload.len(),
        };

        if !compress {
            return raw();
        }

        match self.wrap(payload) {
            Ok(envelope) if envelope.len() < payload.len() => Packet {
                bytes: Bytes::from(envelope),
                compressed: true,
                original_len: payload.len(),
            },
            Ok(_) => raw(),
            Err(e) => {
                warn!(error = %e, len = payload.len(), "Compression failed, sending raw payload");
                raw()
            }
        }
    }

    /// Compress `payload` into a full envelope regardless of size
    pub fn wrap(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let compressed = container::encode(payload, self.level)?;
        let header = EnvelopeHeader {
            compressed_len: compressed.len() as u32,
            original_len: payload.len() as u32,
            reserved: ENVELOPE_RESERVED,
        };

        let mut envelope = Vec::with_capacity(ENVELOPE_HEADER_SIZE + compressed.len());
        header.write_to(&mut envelope);
        envelope.extend_from_slice(&compressed);
        Ok(envelope)
    }
}

/// Split a tagged packet into its header and container bytes
///
/// Returns `None` when the packet does not start with the envelope tag.
pub fn parse_envelope(packet: &[u8]) -> Option<Result<(EnvelopeHeader, &[u8])>> {
    if packet.len() < 4 {
        return None;
    }
    let mut cursor = Cursor::new(packet);
    let tag = cursor.read_u32::<LittleEndian>().ok()?;
    if tag != COMPRESSED_TAG {
        return None;
    }

    Some(parse_tagged(packet, &mut cursor))
}

fn parse_tagged<'a>(
    packet: &'a [u8],
    cursor: &mut Cursor<&'a [u8]>,
) -> Result<(EnvelopeHeader, &'a [u8])> {
    if packet.len() < ENVELOPE_HEADER_SIZE {
        return Err(CodecError::Truncated {
            context: format!("envelope header needs 16 bytes, got {}", packet.len()),
        });
    }

    let header = EnvelopeHeader {
        compressed_len: cursor.read_u32::<LittleEndian>()?,
        original_len: cursor.read_u32::<LittleEndian>()?,
        reserved: cursor.read_u32::<LittleEndian>()?,
    };

    let body = &packet[ENVELOPE_HEADER_SIZE..];
    if body.len() != header.compressed_len as usize {
        return Err(CodecError::Truncated {
            context: format!(
                "envelope declares {} container bytes, packet carries {}",
                header.compressed_len,
                body.len()
            ),
        });
    }

    Ok((header, body))
}

/// Recover the original payload from a packet produced by [`PacketBuilder`]
pub fn open_packet(packet: &[u8]) -> Result<Vec<u8>> {
    match parse_envelope(packet) {
        None => Ok(packet.to_vec()),
        Some(parsed) => {
            let (header, body) = parsed?;
            let payload = container::decode_with_limit(body, header.original_len as usize)?;
            if payload.len() != header.original_len as usize {
                return Err(CodecError::Truncated {
                    context: format!(
                        "envelope declares {} original bytes, container holds {}",
                        header.original_len,
                        payload.len()
                    ),
                });
            }
            Ok(payload)
        }
    }
}
