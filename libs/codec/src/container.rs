//! zlib-compatible container around a raw DEFLATE stream
//!
//! Layout on the wire:
//!
//! ```text
//! ┌─────┬─────┬──────────────────────────┬──────────────────────┐
//! │ CMF │ FLG │ raw DEFLATE body         │ Adler-32 (big-endian)│
//! │ 1B  │ 1B  │ variable                 │ 4B                   │
//! └─────┴─────┴──────────────────────────┴──────────────────────┘
//! ```
//!
//! `CMF` holds the method (8 = deflate) in its low nibble and the window
//! info (7 = 32K) in its high nibble. `FLG` holds the level hint in bits
//! 6-7, the preset dictionary flag in bit 5 and a check value in bits 0-4
//! chosen so that `CMF * 256 + FLG` is a multiple of 31.
//!
//! The DEFLATE primitive comes from `flate2`; header and trailer framing
//! are produced and validated here so that both directions stay byte-exact
//! with what the controller firmware expects.

use std::io::{self, Write};

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::checksum::Adler32;
use crate::error::{CodecError, Result};

/// Deflate compression method identifier
pub const METHOD_DEFLATE: u8 = 8;
/// Window info for a 32K LZ77 window
pub const WINDOW_INFO_32K: u8 = 7;
/// Size of the CMF/FLG header
pub const CONTAINER_HEADER_SIZE: usize = 2;
/// Size of the Adler-32 trailer
pub const CONTAINER_TRAILER_SIZE: usize = 4;
/// Ceiling on inflated output
pub const MAX_DECODED_SIZE: usize = 64 * 1024 * 1024;

/// Level hint carried in the header's FLEVEL bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CompressionLevel {
    Fastest = 0,
    Fast = 1,
    Default = 2,
    #[default]
    Optimal = 3,
}

impl CompressionLevel {
    pub fn flevel(self) -> u8 {
        self as u8
    }

    pub fn from_flevel(flevel: u8) -> Self {
        match flevel & 0b11 {
            0 => Self::Fastest,
            1 => Self::Fast,
            2 => Self::Default,
            _ => Self::Optimal,
        }
    }

    /// DEFLATE effort matching this level hint
    pub fn deflate_level(self) -> Compression {
        match self {
            Self::Fastest => Compression::new(1),
            Self::Fast => Compression::new(5),
            Self::Default => Compression::new(6),
            Self::Optimal => Compression::best(),
        }
    }
}

/// Decoded CMF/FLG header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub method: u8,
    pub window_info: u8,
    pub preset_dictionary: bool,
    pub level: CompressionLevel,
}

impl ContainerHeader {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            method: METHOD_DEFLATE,
            window_info: WINDOW_INFO_32K,
            preset_dictionary: false,
            level,
        }
    }

    /// Serialize to two bytes with a valid check value
    pub fn encode(&self) -> [u8; 2] {
        let cmf = (self.window_info << 4) | (self.method & 0x0F);
        let flg_base = (self.level.flevel() << 6) | (u8::from(self.preset_dictionary) << 5);
        let remainder = (u16::from(cmf) * 256 + u16::from(flg_base)) % 31;
        let fcheck = ((31 - remainder) % 31) as u8;
        [cmf, flg_base | fcheck]
    }

    /// Parse and validate a two-byte header
    pub fn parse(cmf: u8, flg: u8) -> Result<Self> {
        if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
            return Err(CodecError::HeaderCheck { cmf, flg });
        }

        let header = Self {
            method: cmf & 0x0F,
            window_info: cmf >> 4,
            preset_dictionary: flg & 0x20 != 0,
            level: CompressionLevel::from_flevel(flg >> 6),
        };

        if header.method != METHOD_DEFLATE || header.window_info != WINDOW_INFO_32K {
            return Err(CodecError::UnsupportedMethod {
                method: header.method,
                window_info: header.window_info,
            });
        }
        if header.preset_dictionary {
            return Err(CodecError::PresetDictionary);
        }

        Ok(header)
    }
}

/// Streaming container writer
///
/// Writes the header on construction, compresses everything written to it
/// and appends the Adler-32 trailer on [`ContainerEncoder::finish`].
pub struct ContainerEncoder<W: Write> {
    deflate: DeflateEncoder<W>,
    checksum: Adler32,
}

impl<W: Write> ContainerEncoder<W> {
    pub fn new(mut writer: W, level: CompressionLevel) -> io::Result<Self> {
        writer.write_all(&ContainerHeader::new(level).encode())?;
        Ok(Self {
            deflate: DeflateEncoder::new(writer, level.deflate_level()),
            checksum: Adler32::new(),
        })
    }

    /// Flush the final block and write the trailer, returning the writer
    pub fn finish(self) -> io::Result<W> {
        let mut writer = self.deflate.finish()?;
        writer.write_all(&self.checksum.finalize().to_be_bytes())?;
        Ok(writer)
    }
}

impl<W: Write> Write for ContainerEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.deflate.write(buf)?;
        self.checksum.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.deflate.flush()
    }
}

/// Compress a complete buffer into a container
pub fn encode(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let capacity = CONTAINER_HEADER_SIZE + CONTAINER_TRAILER_SIZE + data.len() / 2 + 16;
    let mut encoder = ContainerEncoder::new(Vec::with_capacity(capacity), level)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// True if `data` starts with a valid, supported container header
pub fn is_container(data: &[u8]) -> bool {
    data.len() >= CONTAINER_HEADER_SIZE && ContainerHeader::parse(data[0], data[1]).is_ok()
}

/// Decode a complete container, verifying header, stream end and checksum
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    decode_with_limit(data, MAX_DECODED_SIZE)
}

/// Decode with an explicit ceiling on the inflated size
pub fn decode_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    if data.len() < CONTAINER_HEADER_SIZE + CONTAINER_TRAILER_SIZE {
        return Err(CodecError::truncated(format!(
            "{} bytes cannot hold header and trailer",
            data.len()
        )));
    }

    ContainerHeader::parse(data[0], data[1])?;

    let trailer_start = data.len() - CONTAINER_TRAILER_SIZE;
    let body = &data[CONTAINER_HEADER_SIZE..trailer_start];
    let mut trailer = [0u8; CONTAINER_TRAILER_SIZE];
    trailer.copy_from_slice(&data[trailer_start..]);
    let expected = u32::from_be_bytes(trailer);

    let mut inflater = Decompress::new(false);
    let mut output = Vec::with_capacity((body.len() * 4).clamp(64, limit.max(64)));
    let mut checksum = Adler32::new();

    loop {
        if output.capacity() - output.len() < 1024 {
            output.reserve(output.capacity().max(1024));
        }

        let consumed = inflater.total_in() as usize;
        let produced_before = output.len();
        let status = inflater
            .decompress_vec(&body[consumed..], &mut output, FlushDecompress::None)
            .map_err(|e| CodecError::CorruptStream {
                message: e.to_string(),
            })?;
        checksum.update(&output[produced_before..]);

        if output.len() > limit {
            return Err(CodecError::TooLarge { limit });
        }
        if matches!(status, Status::StreamEnd) {
            break;
        }

        let progressed =
            inflater.total_in() as usize != consumed || output.len() != produced_before;
        if !progressed {
            return Err(CodecError::truncated(
                "deflate stream ended before its final block",
            ));
        }
    }

    let extra = body.len() - inflater.total_in() as usize;
    if extra > 0 {
        return Err(CodecError::TrailingData { extra });
    }

    let calculated = checksum.finalize();
    if calculated != expected {
        return Err(CodecError::ChecksumMismatch {
            expected,
            calculated,
        });
    }

    Ok(output)
}
