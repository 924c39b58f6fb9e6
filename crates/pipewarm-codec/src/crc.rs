/// CRC-32 (IEEE 802.3 polynomial) over a payload, as stored in the archive's
/// per-entry `payload_crc` field. A pure function at the interface the core
/// depends on; the implementation is `crc32fast`'s runtime-dispatched
/// (SSE4.2/PCLMULQDQ where available) checksum.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // CRC-32/ISO-HDLC of b"123456789" is the standard check value.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc32(b""), 0);
    }
}
