//! Firmware integrity checksum
//!
//! Devices verify a downloaded image against the standard CRC-32
//! (IEEE 802.3, reflected polynomial 0xEDB88320) before applying it.

use flate2::Crc;

/// CRC-32 over the complete firmware image
pub fn firmware_crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
