//! Property-based tests for RTP serialization

use bytes::Bytes;
use proptest::prelude::*;
use voxpipe_protocol::cursor::ByteWriter;
use voxpipe_protocol::rtp::{RtpError, RtpHeader, RtpPacket, MAX_CSRC_COUNT};

fn header_strategy() -> impl Strategy<Value = RtpHeader> {
    (
        0u8..=3,      // version
        any::<bool>(), // padding
        any::<bool>(), // extension
        any::<bool>(), // marker
        0u8..=127,    // payload type
        any::<u16>(),
        any::<u32>(),
        any::<u32>(),
        prop::collection::vec(any::<u32>(), 0..=MAX_CSRC_COUNT),
    )
        .prop_map(
            |(version, padding, extension, marker, payload_type, sequence, timestamp, ssrc, csrc_identifiers)| {
                RtpHeader {
                    version,
                    padding,
                    extension,
                    marker,
                    payload_type,
                    sequence,
                    timestamp,
                    ssrc,
                    csrc_identifiers,
                }
            },
        )
}

fn payload_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=256).prop_map(Bytes::from)
}

proptest! {
    #[test]
    fn prop_header_roundtrip(header in header_strategy()) {
        let bytes = header.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), 12 + 4 * header.csrc_count());

        let decoded = RtpHeader::from_bytes(&bytes).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn prop_packet_roundtrip(
        header in header_strategy(),
        body in payload_strategy(),
        padding in 0u8..=32,
    ) {
        let packet = RtpPacket::new(header, body, padding);
        let bytes = packet.to_bytes().unwrap();
        prop_assert_eq!(bytes.len(), packet.size());

        if padding > 0 {
            prop_assert_eq!(*bytes.last().unwrap(), padding);
        }

        let decoded = RtpPacket::from_bytes(&bytes).unwrap();
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn prop_short_buffer_never_partially_written(
        header in header_strategy(),
        capacity in 0usize..12,
    ) {
        let mut writer = ByteWriter::with_size(capacity);
        let result = header.write(&mut writer);

        let is_buffer_too_short = matches!(result, Err(RtpError::BufferTooShort { .. }));
        prop_assert!(is_buffer_too_short);
        prop_assert_eq!(writer.position(), 0);
    }

    #[test]
    fn prop_truncated_header_rejected(header in header_strategy(), cut in 1usize..=12) {
        let bytes = header.to_bytes().unwrap();
        let truncated = &bytes[..bytes.len().saturating_sub(cut)];

        let is_insufficient = matches!(
            RtpHeader::from_bytes(truncated),
            Err(RtpError::InsufficientBytes { .. })
        );
        prop_assert!(is_insufficient);
    }
}

#[test]
fn test_opus_header_vector() {
    let header = RtpHeader::new(1, 960, 0x1122_3344);
    assert_eq!(
        header.to_bytes().unwrap(),
        [0x80, 0x78, 0x00, 0x01, 0x00, 0x00, 0x03, 0xC0, 0x11, 0x22, 0x33, 0x44]
    );
}
