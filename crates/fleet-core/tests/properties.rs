//! Property-Based Tests for fleet core invariants
//!
//! 1. CHECKSUM: fw_crc equals an independently computed CRC-32 of the exact bytes
//! 2. GATING: only "ota" in any letter case is accepted as a command
//! 3. CAPABILITY: a minted URL verifies inside its window and not after it
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use chrono::{Duration, TimeZone, Utc};
use fleet_core::{firmware_crc32, CoreError, OtaCommand, UrlSigner};
use proptest::prelude::*;

/// Bitwise reference CRC-32 (reflected, polynomial 0xEDB88320)
fn reference_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// =============================================================================
// CHECKSUM
// =============================================================================

proptest! {
    #[test]
    fn prop_crc_matches_reference(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        prop_assert_eq!(firmware_crc32(&data), reference_crc32(&data));
    }

    #[test]
    fn prop_crc_detects_appended_byte(
        data in prop::collection::vec(any::<u8>(), 1..512),
        extra in any::<u8>(),
    ) {
        let mut longer = data.clone();
        longer.push(extra);
        prop_assert_ne!(firmware_crc32(&data), firmware_crc32(&longer));
    }
}

// =============================================================================
// GATING
// =============================================================================

proptest! {
    #[test]
    fn prop_ota_any_case_accepted(mask in 0u8..8) {
        let cmd: String = "ota"
            .chars()
            .enumerate()
            .map(|(i, c)| if mask & (1 << i) != 0 { c.to_ascii_uppercase() } else { c })
            .collect();

        prop_assert_eq!(cmd.parse::<OtaCommand>(), Ok(OtaCommand::Ota));
    }

    #[test]
    fn prop_other_commands_rejected(cmd in "[a-zA-Z]{1,12}") {
        prop_assume!(!cmd.eq_ignore_ascii_case("ota"));

        prop_assert_eq!(
            cmd.parse::<OtaCommand>(),
            Err(CoreError::UnsupportedCommand(cmd.clone()))
        );
    }
}

// =============================================================================
// CAPABILITY
// =============================================================================

proptest! {
    #[test]
    fn prop_capability_window(
        key in "[a-z0-9_]{1,24}\\.bin",
        offset in 0i64..120,
        late in 1i64..100_000,
        start in 1_600_000_000i64..1_900_000_000,
    ) {
        let signer = UrlSigner::from_bytes("prop-signer", &[42u8; 32]);
        let now = Utc.timestamp_opt(start, 0).unwrap();

        let cap = signer
            .mint("https://fw.example.com", "bucket", &key, Duration::seconds(120), now)
            .unwrap();

        prop_assert!(signer.verify(&cap.url, now + Duration::seconds(offset)).is_ok());

        let expired = signer.verify(&cap.url, cap.expires_at + Duration::seconds(late));
        prop_assert!(matches!(expired, Err(CoreError::CapabilityExpired(_))));
    }
}
