//! Device Telemetry Record
//!
//! After every successful send a strip controller may write back a fixed-size
//! status record. The layout is `#[repr(C)]`, native byte order, with no padding:
//!
//! ```text
//! offset  size  field
//! 0       4     size            (u32, size of this record as the device sees it)
//! 4       4     flash_version   (u32)
//! 8       8     current_clock   (f64)
//! 16      8     oldest_packet   (f64)
//! 24      8     newest_packet   (f64)
//! 32      8     brightness      (f64)
//! 40      8     wifi_signal     (f64)
//! 48      4     buffer_size     (u32)
//! 52      4     buffer_pos      (u32)
//! 56      4     fps_drawing     (u32)
//! 60      4     watts           (u32)
//! ```

use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Size of the record on the wire
pub const TELEMETRY_RESPONSE_SIZE: usize = 64;

/// Status record reported by a device after it receives data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, AsBytes, FromBytes, FromZeroes)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryResponse {
    pub size: u32,
    pub flash_version: u32,
    pub current_clock: f64,
    pub oldest_packet: f64,
    pub newest_packet: f64,
    pub brightness: f64,
    pub wifi_signal: f64,
    pub buffer_size: u32,
    pub buffer_pos: u32,
    pub fps_drawing: u32,
    pub watts: u32,
}

const _: () = assert!(std::mem::size_of::<TelemetryResponse>() == TELEMETRY_RESPONSE_SIZE);

impl TelemetryResponse {
    /// Parse a record from the front of `bytes`
    ///
    /// Returns `None` when fewer than [`TELEMETRY_RESPONSE_SIZE`] bytes are present or
    /// when the record's own size field is smaller than the record, which the
    /// firmware never sends for a real response.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let record = Self::read_from_prefix(bytes)?;
        record.is_complete().then_some(record)
    }

    /// Whether the size field covers the whole record
    pub fn is_complete(&self) -> bool {
        self.size as usize >= TELEMETRY_RESPONSE_SIZE
    }

    /// Zero every field
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Firmware version formatted for display
    pub fn firmware_version(&self) -> String {
        format!("v{}", self.flash_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetryResponse {
        TelemetryResponse {
            size: TELEMETRY_RESPONSE_SIZE as u32,
            flash_version: 42,
            current_clock: 1_700_000_000.25,
            oldest_packet: 1_700_000_000.5,
            newest_packet: 1_700_000_001.0,
            brightness: 100.0,
            wifi_signal: -61.0,
            buffer_size: 500,
            buffer_pos: 17,
            fps_drawing: 22,
            watts: 9,
        }
    }

    #[test]
    fn test_parse_native_layout() {
        let record = sample();
        let mut bytes = record.as_bytes().to_vec();
        bytes.extend_from_slice(&[0xEE; 5]);

        assert_eq!(TelemetryResponse::parse(&bytes), Some(record));
        assert_eq!(record.firmware_version(), "v42");
    }

    #[test]
    fn test_parse_rejects_short_or_undersized() {
        let record = sample();
        assert!(TelemetryResponse::parse(&record.as_bytes()[..63]).is_none());

        let bogus = TelemetryResponse { size: 12, ..record };
        assert!(TelemetryResponse::parse(bogus.as_bytes()).is_none());
    }

    #[test]
    fn test_reset_zeroes() {
        let mut record = sample();
        record.reset();
        assert_eq!(record, TelemetryResponse::default());
        assert_eq!(record.watts, 0);
    }
}
