//! Device frame encoding
//!
//! A [`FrameEncoder`] turns a channel's pixel bytes plus a presentation
//! timestamp into the payload a controller understands. Any
//! `Fn(&[u8], SystemTime) -> Vec<u8>` closure is an encoder; the stock
//! [`PixelDataEncoder`] produces the firmware's 64-bit pixel data command.

use std::io::Cursor;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CodecError, Result};

/// Firmware command id for timestamped pixel data
pub const WIFI_COMMAND_PIXELDATA64: u16 = 3;
/// Size of the pixel data command header
pub const PIXEL_DATA_HEADER_SIZE: usize = 24;

/// Converts channel pixel bytes into a device payload
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, pixel_bytes: &[u8], timestamp: SystemTime) -> Vec<u8>;
}

impl<F> FrameEncoder for F
where
    F: Fn(&[u8], SystemTime) -> Vec<u8> + Send + Sync,
{
    fn encode(&self, pixel_bytes: &[u8], timestamp: SystemTime) -> Vec<u8> {
        self(pixel_bytes, timestamp)
    }
}

/// Stock encoder for the pixel data command
///
/// ```text
/// u16 command | u16 channel | u32 led count | u64 seconds | u64 micros | RGB...
/// ```
///
/// All integers little-endian. Seconds and micros are since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDataEncoder {
    channel: u16,
}

impl PixelDataEncoder {
    pub fn new(channel: u16) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }
}

impl FrameEncoder for PixelDataEncoder {
    fn encode(&self, pixel_bytes: &[u8], timestamp: SystemTime) -> Vec<u8> {
        let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
        let header = PixelDataHeader {
            command: WIFI_COMMAND_PIXELDATA64,
            channel: self.channel,
            led_count: (pixel_bytes.len() / 3) as u32,
            seconds: since_epoch.as_secs(),
            micros: u64::from(since_epoch.subsec_micros()),
        };

        let mut out = Vec::with_capacity(PIXEL_DATA_HEADER_SIZE + pixel_bytes.len());
        header.write_to(&mut out);
        out.extend_from_slice(pixel_bytes);
        out
    }
}

/// Header of a pixel data command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDataHeader {
    pub command: u16,
    pub channel: u16,
    pub led_count: u32,
    pub seconds: u64,
    pub micros: u64,
}

impl PixelDataHeader {
    fn write_to(&self, out: &mut Vec<u8>) {
        // Writes into a Vec cannot fail
        let _ = out.write_u16::<LittleEndian>(self.command);
        let _ = out.write_u16::<LittleEndian>(self.channel);
        let _ = out.write_u32::<LittleEndian>(self.led_count);
        let _ = out.write_u64::<LittleEndian>(self.seconds);
        let _ = out.write_u64::<LittleEndian>(self.micros);
    }

    /// Parse the header and return it with the trailing pixel bytes
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8])> {
        if frame.len() < PIXEL_DATA_HEADER_SIZE {
            return Err(CodecError::Truncated {
                context: format!(
                    "pixel data header needs {PIXEL_DATA_HEADER_SIZE} bytes, got {}",
                    frame.len()
                ),
            });
        }

        let mut cursor = Cursor::new(frame);
        let header = Self {
            command: cursor.read_u16::<LittleEndian>()?,
            channel: cursor.read_u16::<LittleEndian>()?,
            led_count: cursor.read_u32::<LittleEndian>()?,
            seconds: cursor.read_u64::<LittleEndian>()?,
            micros: cursor.read_u64::<LittleEndian>()?,
        };
        Ok((header, &frame[PIXEL_DATA_HEADER_SIZE..]))
    }

    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.seconds) + Duration::from_micros(self.micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_data_layout() {
        let timestamp = UNIX_EPOCH + Duration::new(1_700_000_000, 250_000_000);
        let frame = PixelDataEncoder::new(2).encode(&[10, 20, 30, 40, 50, 60], timestamp);

        assert_eq!(frame.len(), PIXEL_DATA_HEADER_SIZE + 6);
        assert_eq!(&frame[0..2], &3u16.to_le_bytes());
        assert_eq!(&frame[2..4], &2u16.to_le_bytes());
        assert_eq!(&frame[4..8], &2u32.to_le_bytes());
        assert_eq!(&frame[8..16], &1_700_000_000u64.to_le_bytes());
        assert_eq!(&frame[16..24], &250_000u64.to_le_bytes());
        assert_eq!(&frame[24..], &[10, 20, 30, 40, 50, 60]);

        let (header, pixels) = PixelDataHeader::parse(&frame).unwrap();
        assert_eq!(header.channel, 2);
        assert_eq!(header.timestamp(), timestamp);
        assert_eq!(pixels.len(), 6);
    }

    #[test]
    fn test_closure_encoder() {
        let encoder =
            |bytes: &[u8], _at: SystemTime| -> Vec<u8> { bytes.iter().rev().copied().collect() };
        let boxed: Box<dyn FrameEncoder> = Box::new(encoder);
        assert_eq!(boxed.encode(&[1, 2, 3], SystemTime::now()), vec![3, 2, 1]);
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(PixelDataHeader::parse(&[0u8; 10]).is_err());
    }
}
