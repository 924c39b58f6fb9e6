use std::fmt;
use thiserror::Error;

/// A 64-bit content hash identifying one captured object.
///
/// `(tag, hash)` is the unique key for an archive entry. The all-zero hash
/// is reserved to mean "no dependency" when it appears as a handle
/// reference in capture JSON.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash64(pub u64);

/// Sentinel for `"0000000000000000"` — a dependency field that is present
/// but unset.
pub const NULL_HASH: Hash64 = Hash64(0);

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("hash string has {0} characters, expected 16")]
    WrongLength(usize),
    #[error("hash string is not lowercase hex: {0:?}")]
    NotHex(String),
}

impl Hash64 {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Parses a 16-character lowercase hex string, as used in capture JSON.
    pub fn parse_hex(s: &str) -> Result<Self, HashParseError> {
        if s.len() != 16 {
            return Err(HashParseError::WrongLength(s.len()));
        }
        u64::from_str_radix(s, 16)
            .map(Hash64)
            .map_err(|_| HashParseError::NotHex(s.to_string()))
    }
}

impl fmt::Debug for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash64({self})")
    }
}

impl fmt::Display for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let h = Hash64::parse_hex("00112233445566ff").unwrap();
        assert_eq!(h.0, 0x0011_2233_4455_66ff);
        assert_eq!(h.to_string(), "00112233445566ff");
    }

    #[test]
    fn null_hash_parses_and_is_null() {
        let h = Hash64::parse_hex("0000000000000000").unwrap();
        assert!(h.is_null());
        assert_eq!(h, NULL_HASH);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Hash64::parse_hex("abcd"),
            Err(HashParseError::WrongLength(4))
        ));
    }

    #[test]
    fn rejects_uppercase_or_non_hex() {
        assert!(Hash64::parse_hex("00112233445566GG").is_err());
    }
}
