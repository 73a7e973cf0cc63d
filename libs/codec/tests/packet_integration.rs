//! End-to-end packet tests: pixels in, device bytes out, payload recovered

use std::time::{Duration, UNIX_EPOCH};

use codec::{
    color_bytes_at_offset, colors_from_bytes, open_packet, CompressionLevel, FrameEncoder,
    PacketBuilder, PixelDataEncoder, PixelDataHeader,
};
use proptest::prelude::*;
use types::Crgb;

#[test]
fn test_strip_frame_survives_packet_round_trip() {
    let pixels: Vec<Crgb> = (0..300u32)
        .map(|i| Crgb::from_hsv((i * 3 % 360) as f64, 1.0, 1.0))
        .collect();

    let bytes = color_bytes_at_offset(&pixels, 100, 144, false, false).unwrap();
    let timestamp = UNIX_EPOCH + Duration::from_millis(1_700_000_123_456);
    let frame = PixelDataEncoder::new(0).encode(&bytes, timestamp);

    let packet = PacketBuilder::new(CompressionLevel::Optimal).build(&frame, true);
    assert!(packet.compressed, "smooth gradient frames should compress");

    let recovered = open_packet(&packet.bytes).unwrap();
    let (header, pixel_bytes) = PixelDataHeader::parse(&recovered).unwrap();
    assert_eq!(header.led_count, 144);
    assert_eq!(header.timestamp(), timestamp);
    assert_eq!(colors_from_bytes(pixel_bytes), pixels[100..244].to_vec());
}

proptest! {
    #[test]
    fn prop_packets_always_recover_payload(
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
        compress in any::<bool>(),
    ) {
        let packet = PacketBuilder::default().build(&payload, compress);
        prop_assert!(packet.len() <= payload.len());
        prop_assert_eq!(open_packet(&packet.bytes).unwrap(), payload);
    }
}
