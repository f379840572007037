//! Request and presigned URL validation.
//!
//! [`EscherValidator::validate_request`] runs the checks in a fixed order and
//! stops at the first failure:
//!
//! 1. Parse the auth header (or presigned query parameters) and the date.
//! 2. Check the declared credential scope against the configured one.
//! 3. Check the request date against the accepted time window.
//! 4. Look up the key id and apply its `acceptOnly` policy.
//! 5. Rebuild the canonical request and recompute the signature.
//! 6. Compare both signatures in constant time.
//!
//! On success the key id of the signer is returned.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use subtle::ConstantTimeEq;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::algorithm::HashAlgorithm;
use crate::canonical::build_canonical_request;
use crate::config::{DEFAULT_EXPIRES, EscherConfig};
use crate::date::{parse_request_date, short_date};
use crate::error::{EscherError, EscherResult};
use crate::keydb::KeyDatabase;
use crate::request::{EscherRequest, parse_url};
use crate::signer::UNSIGNED_PAYLOAD;
use crate::signing::{SignatureInput, hash_payload};

/// Per-call validation parameters.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ValidateOptions {
    /// Headers that must appear among the signed headers, in addition to
    /// `host` and the date header.
    #[builder(default, setter(into))]
    pub headers_to_sign: Vec<String>,

    /// The validator's current time; read from the clock when absent.
    #[builder(default, setter(strip_option))]
    pub now: Option<DateTime<Utc>>,

    /// Validity of a header-signed request in seconds. Presigned URLs carry
    /// their own expiry, which takes precedence.
    #[builder(default = DEFAULT_EXPIRES)]
    pub expires: u64,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Components of an auth header.
///
/// Format:
/// ```text
/// EMS-HMAC-SHA256 Credential=KEYID/20110909/us-east-1/host/aws4_request, SignedHeaders=host;x-ems-date, Signature=<hex-signature>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthHeader {
    /// Hash algorithm named in the algorithm identifier.
    pub hash_algo: HashAlgorithm,
    /// The signer's key id.
    pub access_key_id: String,
    /// Short date of the credential (YYYYMMDD).
    pub credential_date: String,
    /// Credential scope without the date.
    pub credential_scope: String,
    /// Declared signed header names, in declared order.
    pub signed_headers: Vec<String>,
    /// Hex-encoded signature.
    pub signature: String,
}

/// Everything the checks need, wherever it was read from.
#[derive(Debug, Clone)]
struct ParsedAuth {
    header: ParsedAuthHeader,
    date: DateTime<Utc>,
    expires: u64,
    presigned: bool,
}

/// Parse an auth header value.
///
/// # Errors
///
/// Returns [`EscherError::InvalidAuthHeader`] if the value does not follow the
/// grammar, [`EscherError::InvalidAlgorithmPrefix`] if the prefix differs from
/// `algo_prefix`, and [`EscherError::UnsupportedHashAlgorithm`] for an unknown
/// hash algorithm.
pub fn parse_auth_header(algo_prefix: &str, header: &str) -> EscherResult<ParsedAuthHeader> {
    let (algorithm, rest) = header.split_once(' ').ok_or(EscherError::InvalidAuthHeader)?;
    let hash_algo = parse_algorithm(algo_prefix, algorithm)?;

    let mut parts = rest.split(", ");
    let credential = parts
        .next()
        .and_then(|p| p.strip_prefix("Credential="))
        .ok_or(EscherError::InvalidAuthHeader)?;
    let signed_headers = parts
        .next()
        .and_then(|p| p.strip_prefix("SignedHeaders="))
        .ok_or(EscherError::InvalidAuthHeader)?;
    let signature = parts
        .next()
        .and_then(|p| p.strip_prefix("Signature="))
        .ok_or(EscherError::InvalidAuthHeader)?;
    if parts.next().is_some() {
        return Err(EscherError::InvalidAuthHeader);
    }

    build_parsed_auth(
        hash_algo,
        credential,
        signed_headers,
        signature,
        EscherError::InvalidAuthHeader,
    )
}

fn parse_algorithm(algo_prefix: &str, algorithm: &str) -> EscherResult<HashAlgorithm> {
    let (prefix, hash) = algorithm
        .split_once("-HMAC-")
        .ok_or(EscherError::InvalidAuthHeader)?;
    if prefix != algo_prefix {
        return Err(EscherError::InvalidAlgorithmPrefix(prefix.to_owned()));
    }
    hash.parse()
}

fn build_parsed_auth(
    hash_algo: HashAlgorithm,
    credential: &str,
    signed_headers: &str,
    signature: &str,
    malformed: EscherError,
) -> EscherResult<ParsedAuthHeader> {
    // KEYID/YYYYMMDD/scope/with/segments
    let (access_key_id, rest) = credential.split_once('/').ok_or_else(|| malformed.clone())?;
    let (credential_date, credential_scope) =
        rest.split_once('/').ok_or_else(|| malformed.clone())?;
    if access_key_id.is_empty()
        || credential_scope.is_empty()
        || credential_date.len() != 8
        || !credential_date.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed);
    }

    let signed_headers: Vec<String> = signed_headers.split(';').map(ToOwned::to_owned).collect();
    if signed_headers.iter().any(String::is_empty) {
        return Err(malformed);
    }
    if signature.is_empty() || !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed);
    }

    Ok(ParsedAuthHeader {
        hash_algo,
        access_key_id: access_key_id.to_owned(),
        credential_date: credential_date.to_owned(),
        credential_scope: credential_scope.to_owned(),
        signed_headers,
        signature: signature.to_owned(),
    })
}

/// Check `date - clock_skew <= now <= date + expires`; both bounds are inclusive.
///
/// # Errors
///
/// Returns [`EscherError::RequestDateOutOfRange`] outside the window and
/// [`EscherError::InvalidExpires`] when the window cannot be represented.
pub fn check_time_window(
    date: &DateTime<Utc>,
    now: &DateTime<Utc>,
    clock_skew: u64,
    expires: u64,
) -> EscherResult<()> {
    let to_delta = |secs: u64| {
        i64::try_from(secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| EscherError::InvalidExpires(secs.to_string()))
    };
    let earliest = date
        .checked_sub_signed(to_delta(clock_skew)?)
        .ok_or_else(|| EscherError::InvalidExpires(clock_skew.to_string()))?;
    let latest = date
        .checked_add_signed(to_delta(expires)?)
        .ok_or_else(|| EscherError::InvalidExpires(expires.to_string()))?;

    if *now < earliest || *now > latest {
        debug!(%date, %now, clock_skew, expires, "Request date outside accepted window");
        return Err(EscherError::RequestDateOutOfRange);
    }
    Ok(())
}

/// Validates signed requests against a key database.
#[derive(Clone)]
pub struct EscherValidator {
    config: EscherConfig,
    key_db: Arc<dyn KeyDatabase>,
}

impl fmt::Debug for EscherValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscherValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EscherValidator {
    /// Create a validator owning its key database.
    pub fn new(config: EscherConfig, key_db: impl KeyDatabase + 'static) -> Self {
        Self::with_shared(config, Arc::new(key_db))
    }

    /// Create a validator over a key database shared with other components.
    #[must_use]
    pub fn with_shared(config: EscherConfig, key_db: Arc<dyn KeyDatabase>) -> Self {
        Self { config, key_db }
    }

    /// The validator's configuration.
    #[must_use]
    pub fn config(&self) -> &EscherConfig {
        &self.config
    }

    /// Validate a request signed with headers or as a presigned URL.
    ///
    /// A request whose query carries the signature parameter is treated as a
    /// presigned URL; otherwise the auth and date headers are used.
    ///
    /// # Errors
    ///
    /// Returns the [`EscherError`] of the first failing check.
    pub fn validate_request(
        &self,
        request: &EscherRequest,
        options: &ValidateOptions,
    ) -> EscherResult<String> {
        let now = options.now.unwrap_or_else(Utc::now);
        let url = parse_url(&request.url)?;
        let signature_param = self.config.query_param("Signature");
        let presigned =
            form_urlencoded::parse(url.query.as_bytes()).any(|(name, _)| name == signature_param);

        // Parse.
        if !request.has_header("host") {
            return Err(EscherError::MissingHeader("host".to_owned()));
        }
        let auth = if presigned {
            self.parse_presigned(&url.query, options.expires)?
        } else {
            self.parse_headers(request, options.expires)?
        };
        if auth.header.credential_date != short_date(&auth.date) {
            return Err(EscherError::CredentialDateMismatch);
        }
        self.check_mandatory_headers(&auth, &options.headers_to_sign)?;

        debug!(
            access_key_id = %auth.header.access_key_id,
            credential_scope = %auth.header.credential_scope,
            presigned,
            "Validating Escher signature"
        );

        // Scope.
        if auth.header.credential_scope != self.config.credential_scope {
            return Err(EscherError::InvalidCredentialScope);
        }

        // Time window.
        check_time_window(&auth.date, &now, self.config.clock_skew, auth.expires)?;

        // Key lookup.
        let entry = self.key_db.get_key(&auth.header.access_key_id)?;
        if !entry
            .accept_only
            .permits(auth.header.hash_algo, &auth.header.credential_scope)
        {
            return Err(EscherError::KeyNotAccepted(entry.key_id));
        }

        // Recompute.
        let (query, payload_hash) = if presigned {
            (
                query_without_param(&url.query, &signature_param),
                UNSIGNED_PAYLOAD.to_owned(),
            )
        } else {
            (
                url.query.clone(),
                hash_payload(auth.header.hash_algo, &request.body),
            )
        };
        let signed_refs: Vec<&str> = auth.header.signed_headers.iter().map(String::as_str).collect();
        let canonical_request = build_canonical_request(
            &request.method,
            &url.path,
            &query,
            &request.header_pairs(),
            &signed_refs,
            &payload_hash,
        )?;
        let expected_signature = SignatureInput {
            algo_prefix: &self.config.algo_prefix,
            hash_algo: auth.header.hash_algo,
            secret: &entry.secret,
            credential_scope: &auth.header.credential_scope,
            date: &auth.date,
        }
        .sign(&canonical_request);

        // Compare.
        let provided = auth.header.signature.to_ascii_lowercase();
        if provided.as_bytes().ct_eq(expected_signature.as_bytes()).into() {
            debug!(access_key_id = %entry.key_id, "Signature verification succeeded");
            Ok(entry.key_id)
        } else {
            debug!(
                expected = %expected_signature,
                provided = %auth.header.signature,
                "Signature mismatch"
            );
            Err(EscherError::SignatureMismatch)
        }
    }

    /// Validate a presigned URL.
    ///
    /// When `headers` has no `Host`, the host comes from the URL (which may
    /// omit the scheme, as in `example.com/path?query`) and only the path and
    /// query are checked.
    ///
    /// # Errors
    ///
    /// Returns the [`EscherError`] of the first failing check.
    pub fn validate_url(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        options: &ValidateOptions,
    ) -> EscherResult<String> {
        let mut headers = headers.to_vec();
        let has_host = headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("host"));

        let url_to_check = if has_host {
            url.to_owned()
        } else {
            let absolute = if has_scheme(url) {
                url.to_owned()
            } else {
                format!("http://{url}")
            };
            let parts = parse_url(&absolute)?;
            let host = parts
                .authority
                .clone()
                .ok_or_else(|| EscherError::InvalidUrl(format!("{url}: no host")))?;
            headers.push(("Host".to_owned(), host));
            parts.path_and_query()
        };

        let request = EscherRequest {
            method: method.to_owned(),
            url: url_to_check,
            headers,
            body: Vec::new(),
        };
        self.validate_request(&request, options)
    }

    /// Validate an `http` request given its parts and collected body.
    ///
    /// # Errors
    ///
    /// Returns the [`EscherError`] of the first failing check.
    pub fn validate_http(
        &self,
        parts: &http::request::Parts,
        body: &[u8],
        options: &ValidateOptions,
    ) -> EscherResult<String> {
        let request = EscherRequest::from_parts(parts, body);
        self.validate_request(&request, options)
    }

    fn parse_headers(&self, request: &EscherRequest, expires: u64) -> EscherResult<ParsedAuth> {
        let date_value = request
            .header(&self.config.date_header_name)
            .ok_or_else(|| EscherError::MissingHeader(self.config.date_header_key()))?;
        let auth_value = request
            .header(&self.config.auth_header_name)
            .ok_or(EscherError::MissingAuthHeader)?;

        let header = parse_auth_header(&self.config.algo_prefix, auth_value)?;
        let date = parse_request_date(date_value)?;

        Ok(ParsedAuth {
            header,
            date,
            expires,
            presigned: false,
        })
    }

    /// Presigned parameters. A URL without an expiry parameter falls back to
    /// `default_expires`.
    fn parse_presigned(&self, query: &str, default_expires: u64) -> EscherResult<ParsedAuth> {
        let params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let name = |suffix: &str| self.config.query_param(suffix);

        let algorithm = find_param(&params, &name("Algorithm"))?;
        let hash_algo = parse_algorithm(&self.config.algo_prefix, algorithm)?;
        let header = build_parsed_auth(
            hash_algo,
            find_param(&params, &name("Credentials"))?,
            find_param(&params, &name("SignedHeaders"))?,
            find_param(&params, &name("Signature"))?,
            EscherError::MissingQueryParam(name("Credentials")),
        )?;
        let date = parse_request_date(find_param(&params, &name("Date"))?)?;
        let expires = match find_optional_param(&params, &name("Expires")) {
            Some(value) => value
                .parse()
                .map_err(|_| EscherError::InvalidExpires(value.to_owned()))?,
            None => default_expires,
        };

        Ok(ParsedAuth {
            header,
            date,
            expires,
            presigned: true,
        })
    }

    fn check_mandatory_headers(
        &self,
        auth: &ParsedAuth,
        headers_to_sign: &[String],
    ) -> EscherResult<()> {
        let mut mandatory = vec!["host".to_owned()];
        if !auth.presigned {
            mandatory.push(self.config.date_header_key());
        }
        mandatory.extend(headers_to_sign.iter().map(|name| name.to_ascii_lowercase()));

        for name in mandatory {
            if !auth.header.signed_headers.contains(&name) {
                return Err(EscherError::HeaderNotSigned(name));
            }
        }
        Ok(())
    }
}

fn find_optional_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> EscherResult<&'a str> {
    find_optional_param(params, name)
        .ok_or_else(|| EscherError::MissingQueryParam(name.to_owned()))
}

/// Drop every pair whose decoded key is `name` from a raw query string.
fn query_without_param(query: &str, name: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            form_urlencoded::parse(pair.as_bytes())
                .next()
                .is_none_or(|(key, _)| key != name)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Whether `url` starts with `<scheme>://`. A `://` after the first `/`, `?`
/// or `#` belongs to the path or query.
fn has_scheme(url: &str) -> bool {
    url.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
    })
}
