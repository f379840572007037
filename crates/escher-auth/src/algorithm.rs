//! Hash algorithms usable for Escher signatures.

use std::fmt;
use std::str::FromStr;

use digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::error::EscherError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hash algorithm named in the `<prefix>-HMAC-<algo>` algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    /// SHA-256, the protocol default.
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// The name used on the wire (`SHA256` / `SHA512`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Hash `data` and return the lowercase hex digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use escher_auth::HashAlgorithm;
    ///
    /// assert_eq!(
    ///     HashAlgorithm::Sha256.hex_digest(b""),
    ///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    #[must_use]
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    /// Compute `HMAC(key, data)` and return the raw bytes.
    #[must_use]
    pub fn hmac(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut mac = <HmacSha256 as KeyInit>::new_from_slice(key)
                    .expect("HMAC can accept keys of any length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512 => {
                let mut mac = <HmacSha512 as KeyInit>::new_from_slice(key)
                    .expect("HMAC can accept keys of any length");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = EscherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            other => Err(EscherError::UnsupportedHashAlgorithm(other.to_owned())),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = EscherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(value: HashAlgorithm) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_supported_algorithms() {
        assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("SHA512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
    }

    #[test]
    fn test_should_reject_unknown_algorithm() {
        let result = "MD5".parse::<HashAlgorithm>();
        assert_eq!(
            result,
            Err(EscherError::UnsupportedHashAlgorithm("MD5".to_owned()))
        );
        // Names are case-sensitive on the wire.
        assert!("sha256".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_should_produce_digest_lengths_per_algorithm() {
        assert_eq!(HashAlgorithm::Sha256.hex_digest(b"abc").len(), 64);
        assert_eq!(HashAlgorithm::Sha512.hex_digest(b"abc").len(), 128);
        assert_eq!(HashAlgorithm::Sha256.hmac(b"key", b"data").len(), 32);
        assert_eq!(HashAlgorithm::Sha512.hmac(b"key", b"data").len(), 64);
    }

    #[test]
    fn test_should_match_rfc4231_hmac_sha256_vector() {
        // RFC 4231 test case 2.
        let mac = HashAlgorithm::Sha256.hmac(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_should_round_trip_through_serde() {
        let json = serde_json::to_string(&HashAlgorithm::Sha512).unwrap();
        assert_eq!(json, "\"SHA512\"");
        let parsed: HashAlgorithm = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, HashAlgorithm::Sha512);
        assert!(serde_json::from_str::<HashAlgorithm>("\"SHA1\"").is_err());
    }
}
