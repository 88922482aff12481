use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::models::error::{CryptoError, CryptoResult};

/// Standard-alphabet, padded base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// Lower-case hex digest.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Serde adapter storing byte fields as base64 strings.
pub(crate) mod base64_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&super::encode_base64(bytes.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = super::decode_base64(&encoded).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_known_vector() {
        assert_eq!(encode_base64(b"journal"), "am91cm5hbA==");
        assert_eq!(decode_base64("am91cm5hbA==").unwrap(), b"journal");
    }

    #[test]
    fn base64_tolerates_surrounding_whitespace() {
        assert_eq!(decode_base64("  am91cm5hbA==\n").unwrap(), b"journal");
    }

    #[test]
    fn invalid_base64_is_encoding_error() {
        assert!(matches!(decode_base64("***"), Err(CryptoError::Encoding(_))));
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex_encode(&[0x00, 0x0f, 0xab]), "000fab");
    }
}
