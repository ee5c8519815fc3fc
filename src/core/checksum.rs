//! CRC-32 integrity checking for the checksummed message variants.
//!
//! The checksum region is the wire text from the variant header through the
//! field immediately preceding the checksum token itself, joined by single
//! spaces. CRC-32 (IEEE polynomial) is computed over the UTF-8 bytes of that
//! region.

/// Compute the CRC-32 checksum of a wire-format region.
pub fn region_crc32(region: &str) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(region.as_bytes());
    hasher.finalize()
}
