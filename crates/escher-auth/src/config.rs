//! Protocol configuration shared by signers and validators.
//!
//! [`EscherConfig`] holds the parameters that are fixed for a signer or
//! validator instance. Per-call values (the signing date, the validator's
//! notion of "now", expiry and headers to sign) are passed with each call
//! instead, so one configured instance can be shared by concurrent callers.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::algorithm::HashAlgorithm;
use crate::error::EscherError;

/// Default algorithm prefix.
pub const DEFAULT_ALGO_PREFIX: &str = "EMS";
/// Default vendor key, used to build presigned query parameter names.
pub const DEFAULT_VENDOR_KEY: &str = "EMS";
/// Default name of the auth header.
pub const DEFAULT_AUTH_HEADER_NAME: &str = "X-EMS-Auth";
/// Default name of the date header.
pub const DEFAULT_DATE_HEADER_NAME: &str = "X-EMS-Date";
/// Default tolerated clock skew, in seconds.
pub const DEFAULT_CLOCK_SKEW: u64 = 300;
/// Default validity of a signature, in seconds.
pub const DEFAULT_EXPIRES: u64 = 600;

/// Escher protocol configuration.
///
/// # Examples
///
/// ```
/// use escher_auth::{EscherConfig, HashAlgorithm};
///
/// let config = EscherConfig::builder()
///     .credential_scope("test/credential_scope/ems_request")
///     .build();
/// assert_eq!(config.hash_algo, HashAlgorithm::Sha256);
/// assert_eq!(config.auth_header_name, "X-EMS-Auth");
/// assert_eq!(config.algorithm_id(), "EMS-HMAC-SHA256");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EscherConfig {
    /// Hash algorithm used for body hashes, the key chain and the signature.
    #[builder(default)]
    #[serde(default)]
    pub hash_algo: HashAlgorithm,

    /// Prefix of the algorithm identifier and of the initial signing key.
    #[builder(default = DEFAULT_ALGO_PREFIX.to_owned(), setter(into))]
    #[serde(default = "default_algo_prefix")]
    pub algo_prefix: String,

    /// Vendor key; presigned query parameters are named `X-<vendorKey>-*`.
    #[builder(default = DEFAULT_VENDOR_KEY.to_owned(), setter(into))]
    #[serde(default = "default_vendor_key")]
    pub vendor_key: String,

    /// Name of the header carrying the authorization string.
    #[builder(default = DEFAULT_AUTH_HEADER_NAME.to_owned(), setter(into))]
    #[serde(default = "default_auth_header_name")]
    pub auth_header_name: String,

    /// Name of the header carrying the request date.
    #[builder(default = DEFAULT_DATE_HEADER_NAME.to_owned(), setter(into))]
    #[serde(default = "default_date_header_name")]
    pub date_header_name: String,

    /// `/`-delimited credential scope, e.g. `eu/service/ems_request`.
    #[builder(setter(into))]
    pub credential_scope: String,

    /// Tolerated clock skew in seconds for requests dated in the future.
    #[builder(default = DEFAULT_CLOCK_SKEW)]
    #[serde(default = "default_clock_skew")]
    pub clock_skew: u64,
}

fn default_algo_prefix() -> String {
    DEFAULT_ALGO_PREFIX.to_owned()
}

fn default_vendor_key() -> String {
    DEFAULT_VENDOR_KEY.to_owned()
}

fn default_auth_header_name() -> String {
    DEFAULT_AUTH_HEADER_NAME.to_owned()
}

fn default_date_header_name() -> String {
    DEFAULT_DATE_HEADER_NAME.to_owned()
}

fn default_clock_skew() -> u64 {
    DEFAULT_CLOCK_SKEW
}

impl EscherConfig {
    /// Load configuration from environment variables.
    ///
    /// `ESCHER_CREDENTIAL_SCOPE` is required; `ESCHER_HASH_ALGO`,
    /// `ESCHER_ALGO_PREFIX`, `ESCHER_VENDOR_KEY`, `ESCHER_AUTH_HEADER_NAME`,
    /// `ESCHER_DATE_HEADER_NAME` and `ESCHER_CLOCK_SKEW` override the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EscherError::InvalidConfig`] if the scope is missing or the
    /// clock skew is not an integer, and
    /// [`EscherError::UnsupportedHashAlgorithm`] for an unknown hash algorithm.
    pub fn from_env() -> Result<Self, EscherError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EscherError> {
        let credential_scope = lookup("ESCHER_CREDENTIAL_SCOPE").ok_or_else(|| {
            EscherError::InvalidConfig("ESCHER_CREDENTIAL_SCOPE is not set".to_owned())
        })?;
        let mut config = Self::builder().credential_scope(credential_scope).build();

        if let Some(v) = lookup("ESCHER_HASH_ALGO") {
            config.hash_algo = v.parse()?;
        }
        if let Some(v) = lookup("ESCHER_ALGO_PREFIX") {
            config.algo_prefix = v;
        }
        if let Some(v) = lookup("ESCHER_VENDOR_KEY") {
            config.vendor_key = v;
        }
        if let Some(v) = lookup("ESCHER_AUTH_HEADER_NAME") {
            config.auth_header_name = v;
        }
        if let Some(v) = lookup("ESCHER_DATE_HEADER_NAME") {
            config.date_header_name = v;
        }
        if let Some(v) = lookup("ESCHER_CLOCK_SKEW") {
            config.clock_skew = v.parse().map_err(|_| {
                EscherError::InvalidConfig(format!("ESCHER_CLOCK_SKEW is not an integer: {v}"))
            })?;
        }

        Ok(config)
    }

    /// The algorithm identifier, e.g. `EMS-HMAC-SHA256`.
    #[must_use]
    pub fn algorithm_id(&self) -> String {
        format!("{}-HMAC-{}", self.algo_prefix, self.hash_algo)
    }

    /// Name of a presigned URL query parameter, e.g. `X-EMS-Signature`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> String {
        format!("X-{}-{name}", self.vendor_key)
    }

    /// Lower-cased date header name as it appears in the signed header list.
    #[must_use]
    pub fn date_header_key(&self) -> String {
        self.date_header_name.to_ascii_lowercase()
    }

    /// Whether the date header carries an RFC 1123 date instead of the long format.
    #[must_use]
    pub fn uses_http_date(&self) -> bool {
        self.date_header_name.eq_ignore_ascii_case("date")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_should_apply_protocol_defaults() {
        let config = EscherConfig::builder().credential_scope("a/b/c").build();
        assert_eq!(config.algo_prefix, "EMS");
        assert_eq!(config.vendor_key, "EMS");
        assert_eq!(config.date_header_name, "X-EMS-Date");
        assert_eq!(config.clock_skew, 300);
        assert_eq!(config.query_param("Signature"), "X-EMS-Signature");
        assert_eq!(config.date_header_key(), "x-ems-date");
        assert!(!config.uses_http_date());
    }

    #[test]
    fn test_should_deserialize_camel_case_with_defaults() {
        let config: EscherConfig = serde_json::from_str(
            r#"{"credentialScope":"eu/suite/ems_request","hashAlgo":"SHA512","vendorKey":"ACME"}"#,
        )
        .unwrap();
        assert_eq!(config.hash_algo, HashAlgorithm::Sha512);
        assert_eq!(config.vendor_key, "ACME");
        assert_eq!(config.algo_prefix, "EMS");
        assert_eq!(config.algorithm_id(), "EMS-HMAC-SHA512");
    }

    #[test]
    fn test_should_load_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("ESCHER_CREDENTIAL_SCOPE", "test/credential_scope/ems_request"),
            ("ESCHER_DATE_HEADER_NAME", "Date"),
            ("ESCHER_CLOCK_SKEW", "60"),
        ]
        .into_iter()
        .collect();
        let config = EscherConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned())).unwrap();
        assert_eq!(config.credential_scope, "test/credential_scope/ems_request");
        assert_eq!(config.clock_skew, 60);
        assert!(config.uses_http_date());
    }

    #[test]
    fn test_should_require_credential_scope_in_env() {
        let result = EscherConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(EscherError::InvalidConfig(_))));
    }

    #[test]
    fn test_should_reject_unknown_hash_algorithm_in_env() {
        let result = EscherConfig::from_lookup(|k| match k {
            "ESCHER_CREDENTIAL_SCOPE" => Some("a/b".to_owned()),
            "ESCHER_HASH_ALGO" => Some("MD5".to_owned()),
            _ => None,
        });
        assert!(matches!(result, Err(EscherError::UnsupportedHashAlgorithm(_))));
    }
}
