//! Escher request signing and request validation.
//!
//! Escher is a canonical-request HMAC scheme in the style of AWS Signature
//! Version 4. A client signs a request (or presigns a URL) with an API key and
//! secret bound to a credential scope; a server recomputes the signature from
//! its key database to authenticate the request and recover the key id.
//!
//! Signer and validator share the canonicalization and key-derivation code,
//! so a legitimate request canonicalizes to the same bytes on both sides.
//!
//! # Usage
//!
//! ```rust
//! use escher_auth::{
//!     EscherConfig, EscherRequest, EscherSigner, EscherValidator, KeyEntry, SignOptions,
//!     StaticKeyDatabase, ValidateOptions,
//! };
//!
//! let config = EscherConfig::builder()
//!     .credential_scope("test/credential_scope/ems_request")
//!     .build();
//!
//! let signer = EscherSigner::new(config.clone(), "test-key_v1", "T3St s3cR3T!");
//! let request = EscherRequest::new("POST", "/check-signed-request")
//!     .with_header("Host", "localhost:5000")
//!     .with_body(r#"{"id":42}"#);
//! let headers = signer.sign_request(&request, &SignOptions::default()).unwrap();
//!
//! let validator = EscherValidator::new(
//!     config,
//!     StaticKeyDatabase::new(vec![KeyEntry::new("test-key_v1", "T3St s3cR3T!")]),
//! );
//! let signed = EscherRequest { headers, ..request };
//! let key_id = validator.validate_request(&signed, &ValidateOptions::default()).unwrap();
//! assert_eq!(key_id, "test-key_v1");
//! ```
//!
//! # Modules
//!
//! - [`algorithm`] - Supported hash algorithms
//! - [`canonical`] - Canonical request construction
//! - [`config`] - Protocol configuration
//! - [`date`] - Wire date formats
//! - [`error`] - Error types
//! - [`keydb`] - Key database trait and in-memory implementation
//! - [`request`] - Request representation
//! - [`signer`] - Request and URL signing
//! - [`signing`] - Key derivation and signature computation
//! - [`validator`] - Request and URL validation

pub mod algorithm;
pub mod canonical;
pub mod config;
pub mod date;
pub mod error;
pub mod keydb;
pub mod request;
pub mod signer;
pub mod signing;
pub mod validator;

pub use algorithm::HashAlgorithm;
pub use config::EscherConfig;
pub use error::{ErrorKind, EscherError, EscherResult};
pub use keydb::{AcceptOnly, KeyDatabase, KeyEntry, StaticKeyDatabase};
pub use request::EscherRequest;
pub use signer::{EscherSigner, SignOptions};
pub use validator::{EscherValidator, ValidateOptions};
