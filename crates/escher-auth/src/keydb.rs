//! Key database trait and an in-memory implementation.
//!
//! The validator resolves the secret for a key id through [`KeyDatabase`].
//! Storage and rotation are up to the caller; [`StaticKeyDatabase`] covers
//! configuration files and tests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::HashAlgorithm;
use crate::error::EscherError;

/// Restriction on the signing context a key may be used for.
///
/// The default accepts any algorithm and any scope. In JSON the policy is
/// either the integer `0` (no restriction) or an object with optional
/// `hashAlgo` and `credentialScope` fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AcceptOnlyRepr", rename_all = "camelCase")]
pub struct AcceptOnly {
    /// Only requests signed with this hash algorithm are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algo: Option<HashAlgorithm>,
    /// Only requests in this credential scope are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_scope: Option<String>,
}

impl AcceptOnly {
    /// Whether a request signed with `hash_algo` in `credential_scope` may use this key.
    #[must_use]
    pub fn permits(&self, hash_algo: HashAlgorithm, credential_scope: &str) -> bool {
        self.hash_algo.is_none_or(|allowed| allowed == hash_algo)
            && self
                .credential_scope
                .as_deref()
                .is_none_or(|allowed| allowed == credential_scope)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AcceptOnlyRepr {
    Flag(u8),
    #[serde(rename_all = "camelCase")]
    Rule {
        #[serde(default)]
        hash_algo: Option<HashAlgorithm>,
        #[serde(default)]
        credential_scope: Option<String>,
    },
}

impl TryFrom<AcceptOnlyRepr> for AcceptOnly {
    type Error = String;

    fn try_from(value: AcceptOnlyRepr) -> Result<Self, Self::Error> {
        match value {
            AcceptOnlyRepr::Flag(0) => Ok(Self::default()),
            AcceptOnlyRepr::Flag(other) => Err(format!("unsupported acceptOnly flag: {other}")),
            AcceptOnlyRepr::Rule {
                hash_algo,
                credential_scope,
            } => Ok(Self {
                hash_algo,
                credential_scope,
            }),
        }
    }
}

/// One record of a key database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    /// Public key identifier (the access key id of the signer).
    pub key_id: String,
    /// Shared secret.
    pub secret: String,
    /// Acceptance policy.
    #[serde(default)]
    pub accept_only: AcceptOnly,
}

impl KeyEntry {
    /// Create an entry without restrictions.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
            accept_only: AcceptOnly::default(),
        }
    }

    /// Attach an acceptance policy.
    #[must_use]
    pub fn with_accept_only(mut self, accept_only: AcceptOnly) -> Self {
        self.accept_only = accept_only;
        self
    }
}

/// Trait for looking up key entries by key id.
///
/// Implementations may back this with a database, configuration file,
/// or any other key store.
pub trait KeyDatabase: Send + Sync {
    /// Retrieve the entry for the given key id.
    ///
    /// # Errors
    ///
    /// Returns [`EscherError::UnknownKeyId`] if the key id is not recognized.
    fn get_key(&self, key_id: &str) -> Result<KeyEntry, EscherError>;
}

/// A simple in-memory key database backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use escher_auth::keydb::{KeyDatabase, KeyEntry, StaticKeyDatabase};
///
/// let db = StaticKeyDatabase::new(vec![KeyEntry::new("test-key_v1", "T3St s3cR3T!")]);
///
/// let entry = db.get_key("test-key_v1").unwrap();
/// assert_eq!(entry.secret, "T3St s3cR3T!");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticKeyDatabase {
    keys: HashMap<String, KeyEntry>,
}

impl StaticKeyDatabase {
    /// Create a database from entries. A later entry replaces an earlier one with the same id.
    pub fn new(entries: impl IntoIterator<Item = KeyEntry>) -> Self {
        Self {
            keys: entries
                .into_iter()
                .map(|entry| (entry.key_id.clone(), entry))
                .collect(),
        }
    }

    /// Parse a JSON array of `{keyId, secret, acceptOnly}` records.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is not such an array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<KeyEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the database holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<KeyEntry> for StaticKeyDatabase {
    fn from_iter<T: IntoIterator<Item = KeyEntry>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl KeyDatabase for StaticKeyDatabase {
    fn get_key(&self, key_id: &str) -> Result<KeyEntry, EscherError> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| EscherError::UnknownKeyId(key_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_return_entry_for_known_key() {
        let db = StaticKeyDatabase::new(vec![KeyEntry::new("AKID", "secret")]);
        let entry = db.get_key("AKID").unwrap();
        assert_eq!(entry.secret, "secret");
        assert_eq!(entry.accept_only, AcceptOnly::default());
    }

    #[test]
    fn test_should_return_error_for_unknown_key() {
        let db = StaticKeyDatabase::default();
        assert!(db.is_empty());
        assert_eq!(
            db.get_key("UNKNOWN"),
            Err(EscherError::UnknownKeyId("UNKNOWN".to_owned()))
        );
    }

    #[test]
    fn test_should_parse_legacy_zero_flag() {
        let db = StaticKeyDatabase::from_json(
            r#"[{"keyId":"test-key_v1","secret":"T3St s3cR3T!","acceptOnly":0}]"#,
        )
        .unwrap();
        assert_eq!(db.len(), 1);
        let entry = db.get_key("test-key_v1").unwrap();
        assert!(entry.accept_only.permits(HashAlgorithm::Sha512, "any/scope"));
    }

    #[test]
    fn test_should_parse_policy_object() {
        let db = StaticKeyDatabase::from_json(
            r#"[{"keyId":"k","secret":"s","acceptOnly":{"hashAlgo":"SHA512","credentialScope":"a/b"}}]"#,
        )
        .unwrap();
        let policy = db.get_key("k").unwrap().accept_only;
        assert!(policy.permits(HashAlgorithm::Sha512, "a/b"));
        assert!(!policy.permits(HashAlgorithm::Sha256, "a/b"));
        assert!(!policy.permits(HashAlgorithm::Sha512, "a/c"));
    }

    #[test]
    fn test_should_reject_unknown_flag_value() {
        let result =
            StaticKeyDatabase::from_json(r#"[{"keyId":"k","secret":"s","acceptOnly":3}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_default_missing_policy() {
        let db = StaticKeyDatabase::from_json(r#"[{"keyId":"k","secret":"s"}]"#).unwrap();
        assert_eq!(db.get_key("k").unwrap().accept_only, AcceptOnly::default());
    }
}
