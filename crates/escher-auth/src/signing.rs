//! Signing-key derivation and signature computation.
//!
//! ```text
//! key_0     = algoPrefix ‖ secret
//! key_1     = HMAC(key_0, YYYYMMDD)
//! key_i     = HMAC(key_{i-1}, scope segment i-1)
//!
//! StringToSign = <algoPrefix>-HMAC-<hashAlgo>\n
//!                <YYYYMMDDTHHMMSSZ>\n
//!                <YYYYMMDD>/<credentialScope>\n
//!                hex(hash(canonicalRequest))
//!
//! Signature    = hex(HMAC(key_n, StringToSign))
//! ```
//!
//! With the `AWS4` prefix this is exactly the AWS SigV4 key chain.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::algorithm::HashAlgorithm;
use crate::date::{long_date, short_date};

/// Derive the signing key for a short date and credential scope.
///
/// # Examples
///
/// ```
/// use escher_auth::HashAlgorithm;
/// use escher_auth::signing::derive_signing_key;
///
/// let key = derive_signing_key(
///     HashAlgorithm::Sha256,
///     "EMS",
///     "T3St s3cR3T!",
///     "20210101",
///     "test/credential_scope/ems_request",
/// );
/// assert_eq!(key.len(), 32);
/// ```
#[must_use]
pub fn derive_signing_key(
    hash_algo: HashAlgorithm,
    algo_prefix: &str,
    secret: &str,
    short_date: &str,
    credential_scope: &str,
) -> Vec<u8> {
    let initial = format!("{algo_prefix}{secret}").into_bytes();
    let date_key = hash_algo.hmac(&initial, short_date.as_bytes());
    credential_scope
        .split('/')
        .fold(date_key, |key, segment| hash_algo.hmac(&key, segment.as_bytes()))
}

/// Build the string to sign.
///
/// `full_scope` is the short date followed by the credential scope,
/// e.g. `20110909/us-east-1/host/aws4_request`.
#[must_use]
pub fn build_string_to_sign(
    algo_prefix: &str,
    hash_algo: HashAlgorithm,
    long_date: &str,
    full_scope: &str,
    canonical_request: &str,
) -> String {
    let canonical_hash = hash_algo.hex_digest(canonical_request.as_bytes());
    format!("{algo_prefix}-HMAC-{hash_algo}\n{long_date}\n{full_scope}\n{canonical_hash}")
}

/// Compute the hex-encoded HMAC of `string_to_sign` under `signing_key`.
#[must_use]
pub fn compute_signature(hash_algo: HashAlgorithm, signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hash_algo.hmac(signing_key, string_to_sign.as_bytes()))
}

/// Hash a request body; the result goes into the last canonical request line.
#[must_use]
pub fn hash_payload(hash_algo: HashAlgorithm, payload: &[u8]) -> String {
    hash_algo.hex_digest(payload)
}

/// Inputs of one signature computation, shared by the signer and validator.
#[derive(Debug, Clone, Copy)]
pub struct SignatureInput<'a> {
    /// Algorithm prefix, e.g. `EMS`.
    pub algo_prefix: &'a str,
    /// Hash algorithm.
    pub hash_algo: HashAlgorithm,
    /// API secret.
    pub secret: &'a str,
    /// Credential scope without the date.
    pub credential_scope: &'a str,
    /// Request date.
    pub date: &'a DateTime<Utc>,
}

impl SignatureInput<'_> {
    /// Sign a canonical request.
    #[must_use]
    pub fn sign(&self, canonical_request: &str) -> String {
        let short = short_date(self.date);
        let full_scope = format!("{short}/{}", self.credential_scope);
        let string_to_sign = build_string_to_sign(
            self.algo_prefix,
            self.hash_algo,
            &long_date(self.date),
            &full_scope,
            canonical_request,
        );

        debug!(canonical_request, string_to_sign, "Built string to sign");

        let signing_key = derive_signing_key(
            self.hash_algo,
            self.algo_prefix,
            self.secret,
            &short,
            self.credential_scope,
        );
        compute_signature(self.hash_algo, &signing_key, &string_to_sign)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const AWS_SECRET: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_should_reproduce_aws_sigv4_key_chain() {
        let signing_key = derive_signing_key(
            HashAlgorithm::Sha256,
            "AWS4",
            AWS_SECRET,
            "20130524",
            "us-east-1/s3/aws4_request",
        );

        let string_to_sign = "AWS4-HMAC-SHA256\n\
                              20130524T000000Z\n\
                              20130524/us-east-1/s3/aws4_request\n\
                              7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972";

        assert_eq!(
            compute_signature(HashAlgorithm::Sha256, &signing_key, string_to_sign),
            "f0e8bdb87c964420e857bd35b5d6ed310bd44f0170aba48dd91039c6036bdb41"
        );
    }

    #[test]
    fn test_should_build_string_to_sign() {
        let sts = build_string_to_sign(
            "EMS",
            HashAlgorithm::Sha256,
            "20110909T233600Z",
            "20110909/us-east-1/host/aws4_request",
            "",
        );
        let expected = "EMS-HMAC-SHA256\n\
                        20110909T233600Z\n\
                        20110909/us-east-1/host/aws4_request\n\
                        e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(sts, expected);
    }

    #[test]
    fn test_should_bind_key_to_date_and_scope() {
        let base = derive_signing_key(HashAlgorithm::Sha256, "EMS", "s", "20210101", "a/b");
        assert_eq!(
            base,
            derive_signing_key(HashAlgorithm::Sha256, "EMS", "s", "20210101", "a/b")
        );
        assert_ne!(
            base,
            derive_signing_key(HashAlgorithm::Sha256, "EMS", "s", "20210102", "a/b")
        );
        assert_ne!(
            base,
            derive_signing_key(HashAlgorithm::Sha256, "EMS", "s", "20210101", "a/c")
        );
        assert_ne!(
            base,
            derive_signing_key(HashAlgorithm::Sha256, "AWS4", "s", "20210101", "a/b")
        );
    }

    #[test]
    fn test_should_sign_with_sha512() {
        let date = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let input = SignatureInput {
            algo_prefix: "EMS",
            hash_algo: HashAlgorithm::Sha512,
            secret: "secret",
            credential_scope: "a/b/c",
            date: &date,
        };
        let signature = input.sign("GET\n/\n\nhost:example.com\n\nhost\n");
        assert_eq!(signature.len(), 128);
    }

    #[test]
    fn test_should_hash_empty_payload() {
        assert_eq!(
            hash_payload(HashAlgorithm::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
