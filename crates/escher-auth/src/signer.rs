//! Request and URL signing.
//!
//! [`EscherSigner`] adds a date header and an auth header to a request, or
//! turns a URL into a presigned URL whose query carries the signature.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::canonical::{build_canonical_request, uri_encode};
use crate::config::{DEFAULT_EXPIRES, EscherConfig};
use crate::date::{http_date, long_date, short_date};
use crate::error::{EscherError, EscherResult};
use crate::request::{EscherRequest, parse_url};
use crate::signing::{SignatureInput, hash_payload};

/// Payload hash used in place of a body hash for presigned URLs.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Per-call signing parameters.
///
/// # Examples
///
/// ```
/// use escher_auth::SignOptions;
///
/// let options = SignOptions::builder().expires(86_400).build();
/// assert!(options.date.is_none());
/// assert!(options.headers_to_sign.is_empty());
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct SignOptions {
    /// Headers to sign besides `host` and the date header. When empty, every
    /// supplied header is signed.
    #[builder(default, setter(into))]
    pub headers_to_sign: Vec<String>,

    /// Signing time; the current time when absent.
    #[builder(default, setter(strip_option))]
    pub date: Option<DateTime<Utc>>,

    /// Validity of a presigned URL in seconds.
    #[builder(default = DEFAULT_EXPIRES)]
    pub expires: u64,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Signs requests and URLs with one API key.
#[derive(Clone)]
pub struct EscherSigner {
    config: EscherConfig,
    access_key_id: String,
    api_secret: String,
}

impl fmt::Debug for EscherSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscherSigner")
            .field("config", &self.config)
            .field("access_key_id", &self.access_key_id)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl EscherSigner {
    /// Create a signer for the given key.
    pub fn new(
        config: EscherConfig,
        access_key_id: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            config,
            access_key_id: access_key_id.into(),
            api_secret: api_secret.into(),
        }
    }

    /// The signer's configuration.
    #[must_use]
    pub fn config(&self) -> &EscherConfig {
        &self.config
    }

    /// Sign a request and return its headers plus the date and auth headers.
    ///
    /// Date and auth headers already present on the request are replaced.
    /// When the request carries no `Host` header and its URL is absolute, the
    /// host is taken from the URL.
    ///
    /// # Errors
    ///
    /// Returns [`EscherError::InvalidUrl`] for an unparsable URL and
    /// [`EscherError::MissingHeader`] when a header to sign (including `host`)
    /// is absent.
    pub fn sign_request(
        &self,
        request: &EscherRequest,
        options: &SignOptions,
    ) -> EscherResult<Vec<(String, String)>> {
        let date = options.date.unwrap_or_else(Utc::now);
        let url = parse_url(&request.url)?;
        let date_header = &self.config.date_header_name;
        let auth_header = &self.config.auth_header_name;

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(date_header) && !name.eq_ignore_ascii_case(auth_header)
            })
            .cloned()
            .collect();

        if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("host")) {
            if let Some(authority) = url.authority {
                headers.push(("Host".to_owned(), authority));
            }
        }

        let date_value = if self.config.uses_http_date() {
            http_date(&date)
        } else {
            long_date(&date)
        };
        headers.push((date_header.clone(), date_value));

        let signed_headers = self.select_headers_to_sign(&headers, &options.headers_to_sign);
        let signed_refs: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
        let header_pairs: Vec<(&str, &str)> = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let payload_hash = hash_payload(self.config.hash_algo, &request.body);
        let canonical_request = build_canonical_request(
            &request.method,
            &url.path,
            &url.query,
            &header_pairs,
            &signed_refs,
            &payload_hash,
        )?;

        let signature = self.signature_input(&date).sign(&canonical_request);
        let auth_value = format!(
            "{} Credential={}, SignedHeaders={}, Signature={signature}",
            self.config.algorithm_id(),
            self.credential(&date),
            signed_refs.join(";"),
        );

        debug!(
            access_key_id = %self.access_key_id,
            signed_headers = %signed_refs.join(";"),
            "Signed request"
        );

        headers.push((auth_header.clone(), auth_value));
        Ok(headers)
    }

    /// Presign an absolute URL.
    ///
    /// The returned URL carries the algorithm, credentials, date, expiry and
    /// signed headers as query parameters, followed by the signature.
    ///
    /// # Errors
    ///
    /// Returns [`EscherError::InvalidUrl`] if the URL cannot be parsed or is
    /// not absolute.
    pub fn sign_url(&self, method: &str, url: &str, options: &SignOptions) -> EscherResult<String> {
        let date = options.date.unwrap_or_else(Utc::now);
        let parts = parse_url(url)?;
        let (Some(_), Some(host)) = (&parts.scheme, &parts.authority) else {
            return Err(EscherError::InvalidUrl(format!(
                "{url}: an absolute URL with a host is required"
            )));
        };

        let params = [
            ("Algorithm", self.config.algorithm_id()),
            ("Credentials", self.credential(&date)),
            ("Date", long_date(&date)),
            ("Expires", options.expires.to_string()),
            ("SignedHeaders", "host".to_owned()),
        ];
        let escher_query = params
            .iter()
            .map(|(name, value)| format!("{}={}", self.config.query_param(name), uri_encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        let query = if parts.query.is_empty() {
            escher_query
        } else {
            format!("{}&{escher_query}", parts.query)
        };

        let canonical_request = build_canonical_request(
            method,
            &parts.path,
            &query,
            &[("host", host.as_str())],
            &["host"],
            UNSIGNED_PAYLOAD,
        )?;
        let signature = self.signature_input(&date).sign(&canonical_request);

        debug!(access_key_id = %self.access_key_id, expires = options.expires, "Signed URL");

        let base = url.split(['?', '#']).next().unwrap_or(url);
        Ok(format!(
            "{base}?{query}&{}={signature}",
            self.config.query_param("Signature")
        ))
    }

    /// `host`, the date header and either the explicit list or every supplied
    /// header, lower-cased, deduplicated and sorted.
    fn select_headers_to_sign(
        &self,
        headers: &[(String, String)],
        headers_to_sign: &[String],
    ) -> Vec<String> {
        let mut names: BTreeSet<String> = if headers_to_sign.is_empty() {
            headers
                .iter()
                .map(|(name, _)| name.to_ascii_lowercase())
                .collect()
        } else {
            headers_to_sign
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect()
        };
        names.insert("host".to_owned());
        names.insert(self.config.date_header_key());
        names.into_iter().collect()
    }

    fn credential(&self, date: &DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}",
            self.access_key_id,
            short_date(date),
            self.config.credential_scope
        )
    }

    fn signature_input<'a>(&'a self, date: &'a DateTime<Utc>) -> SignatureInput<'a> {
        SignatureInput {
            algo_prefix: &self.config.algo_prefix,
            hash_algo: self.config.hash_algo,
            secret: &self.api_secret,
            credential_scope: &self.config.credential_scope,
            date,
        }
    }
}
