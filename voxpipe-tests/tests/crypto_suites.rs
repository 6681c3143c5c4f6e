//! End-to-end tests across every crypto suite
//!
//! Datagrams are produced by the packet provider exactly as they would go on
//! the wire, then authenticated and decrypted by an independent receiver.

use proptest::prelude::*;
use std::collections::HashSet;
use voxpipe::PacketProvider;
use voxpipe_protocol::cursor::ByteWriter;
use voxpipe_protocol::rtp::{RtpHeader, RTP_HEADER_SIZE};
use voxpipe_crypto::cm_hmac::{self, generate_counter};
use voxpipe_crypto::kdf::SessionKeys;
use voxpipe_crypto::{
    CryptoError, CryptoSuite, DecryptionStrategy, EncryptionStrategy, MasterKey, SUITE_NAMES,
};

fn key_for(suite: &str) -> Vec<u8> {
    if suite == cm_hmac::SUITE_NAME {
        MasterKey::new([0x11; 16], [0x22; 14]).to_bytes()
    } else {
        vec![0x33; 32]
    }
}

fn pair(suite: &str) -> (CryptoSuite, CryptoSuite) {
    let key = key_for(suite);
    (
        CryptoSuite::from_name(suite, &key).unwrap(),
        CryptoSuite::from_name(suite, &key).unwrap(),
    )
}

#[test]
fn test_every_suite_roundtrips() {
    for suite in SUITE_NAMES {
        let (sender, mut receiver) = pair(suite);
        let mut provider = PacketProvider::new(0xCAFE, sender);

        for i in 0..20u8 {
            let frame = vec![i; 40 + i as usize];
            let datagram = provider.provide(&frame).unwrap();
            let packet = receiver.decrypt(&datagram).unwrap();

            assert_eq!(packet.header.ssrc, 0xCAFE, "{}", suite);
            assert_eq!(packet.header.sequence, i as u16 + 1, "{}", suite);
            assert_eq!(packet.header.timestamp, i as u32 * 960, "{}", suite);
            assert_eq!(&packet.body[..], &frame[..], "{}", suite);
        }
    }
}

#[test]
fn test_padding_stripped_after_decrypt() {
    let mut header = RtpHeader::new(5, 4800, 0xBEEF);
    header.padding = true;
    // Body followed by 4 padding bytes, the last holding the count
    let payload = [0xAB, 0xCD, 0xEF, 0, 0, 0, 4];

    for suite in SUITE_NAMES {
        let (mut sender, mut receiver) = pair(suite);

        let mut cursor = ByteWriter::with_size(2048);
        header.write(&mut cursor).unwrap();
        sender.encrypt(&mut cursor, &header, &payload).unwrap();

        let packet = receiver.decrypt(cursor.written()).unwrap();
        assert!(packet.header.padding, "{}", suite);
        assert_eq!(packet.padding, 4, "{}", suite);
        assert_eq!(&packet.body[..], &[0xAB, 0xCD, 0xEF][..], "{}", suite);
    }
}

#[test]
fn test_wrong_key_rejected() {
    for suite in SUITE_NAMES {
        let sender = CryptoSuite::from_name(suite, &key_for(suite)).unwrap();
        let mut provider = PacketProvider::new(1, sender);

        let mut other_key = key_for(suite);
        other_key[0] ^= 0xFF;
        let mut receiver = CryptoSuite::from_name(suite, &other_key).unwrap();

        let datagram = provider.provide(b"secret voice").unwrap();
        assert!(
            matches!(receiver.decrypt(&datagram), Err(CryptoError::AuthenticationFailed)),
            "{}",
            suite
        );
    }
}

#[test]
fn test_payload_is_not_sent_in_clear() {
    let frame = b"plainly audible opus frame";
    for suite in SUITE_NAMES {
        let (sender, _) = pair(suite);
        let mut provider = PacketProvider::new(1, sender);

        let datagram = provider.provide(frame).unwrap();
        assert!(
            !datagram.windows(frame.len()).any(|w| w == frame),
            "{}",
            suite
        );
    }
}

#[test]
fn test_nonce_suffixes_unique() {
    // Suffix and counter suites carry the nonce at the end of every datagram
    let trailing = [
        ("xsalsa20_poly1305_suffix", 24),
        ("xsalsa20_poly1305_lite", 4),
        ("aead_aes256_gcm", 4),
    ];

    for (suite, len) in trailing {
        let (sender, _) = pair(suite);
        let mut provider = PacketProvider::new(1, sender);

        let mut seen = HashSet::new();
        for _ in 0..5000 {
            let datagram = provider.provide(b"x").unwrap();
            let nonce = datagram[datagram.len() - len..].to_vec();
            assert!(seen.insert(nonce), "{} repeated a nonce", suite);
        }
    }
}

#[test]
fn test_counter_unique_across_rollover() {
    let master = MasterKey::new([1; 16], [2; 14]);
    let keys = SessionKeys::derive(&master).unwrap();
    let mut suite = CryptoSuite::from_name(cm_hmac::SUITE_NAME, &master.to_bytes()).unwrap();

    let mut seen = HashSet::new();
    let mut seq = 60_000u16;
    let mut roc = 0u32;
    for _ in 0..10_000 {
        let next = suite.next_sequence(seq);
        if next < seq {
            roc += 1;
        }
        seq = next;
        assert!(seen.insert(generate_counter(0xABCD, roc, seq, &keys.salt)));
    }
    assert_eq!(roc, 1);
}

#[test]
fn test_cm_sequence_wraps_once_per_65536() {
    let (mut suite, _) = pair(cm_hmac::SUITE_NAME);

    let mut seq = 0u16;
    let mut wraps = 0;
    for _ in 0..65_536 {
        let next = suite.next_sequence(seq);
        if next == 0 {
            wraps += 1;
        }
        seq = next;
    }

    assert_eq!(seq, 0);
    assert_eq!(wraps, 1);
    match suite {
        CryptoSuite::AesCmHmacSha1(cm) => assert_eq!(cm.rollover_counter(), 1),
        other => panic!("unexpected suite {:?}", other),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_frame_roundtrips(
        suite in prop::sample::select(SUITE_NAMES.to_vec()),
        frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..=400), 1..8),
        ssrc in any::<u32>(),
    ) {
        let (sender, mut receiver) = pair(suite);
        let mut provider = PacketProvider::new(ssrc, sender);

        for frame in &frames {
            let datagram = provider.provide(frame).unwrap();
            let packet = receiver.decrypt(&datagram).unwrap();
            prop_assert_eq!(&packet.body[..], &frame[..]);
            prop_assert_eq!(packet.header.ssrc, ssrc);
        }
    }

    #[test]
    fn prop_any_bit_flip_rejected(
        suite in prop::sample::select(SUITE_NAMES.to_vec()),
        frame in prop::collection::vec(any::<u8>(), 1..=200),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let (sender, mut receiver) = pair(suite);
        let mut provider = PacketProvider::new(9, sender);

        let mut datagram = provider.provide(&frame).unwrap();
        // Everything after the fixed header is covered by every suite's tag
        let index = RTP_HEADER_SIZE + flip.index(datagram.len() - RTP_HEADER_SIZE);
        datagram[index] ^= 1 << bit;

        prop_assert!(receiver.decrypt(&datagram).is_err());
    }
}
