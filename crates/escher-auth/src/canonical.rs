//! Canonical request construction for Escher.
//!
//! The canonical request is the newline-separated string:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Signer and validator both build it through this module, so a legitimate
//! request canonicalizes to the same bytes on both sides.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::{EscherError, EscherResult};

/// Characters that are percent-encoded in path segments and query components.
///
/// Everything except the RFC 3986 unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) is encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
///
/// Header lines and the signed headers line follow the order of
/// `signed_headers` exactly. The signer passes a sorted list; the validator
/// passes the list declared by the client.
///
/// # Errors
///
/// Returns [`EscherError::MissingHeader`] if a name in `signed_headers` has no
/// value in `headers`.
///
/// # Examples
///
/// ```
/// use escher_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "get",
///     "/",
///     "foo=bar&baz=barbaz",
///     &[("Host", "example.com"), ("X-EMS-Date", "20110909T233600Z")],
///     &["host", "x-ems-date"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// )
/// .unwrap();
/// assert!(canonical.starts_with("GET\n/\nbaz=barbaz&foo=bar\nhost:example.com\n"));
/// ```
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> EscherResult<String> {
    let method = method.to_ascii_uppercase();
    let canonical_uri = build_canonical_uri(path);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers)?;
    let signed_headers_str = build_signed_headers_string(signed_headers);

    Ok(format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    ))
}

/// Normalize a request path.
///
/// Empty paths become `/`, `.` and `..` segments are resolved, repeated
/// slashes are collapsed, and each segment is decoded and re-encoded so that
/// already-encoded and raw paths canonicalize identically. A trailing slash is
/// kept.
///
/// # Examples
///
/// ```
/// use escher_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri(""), "/");
/// assert_eq!(build_canonical_uri("/a/./b/../c//d"), "/a/c/d");
/// assert_eq!(build_canonical_uri("/hello world/"), "/hello%20world/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            raw => {
                let decoded = percent_decode_str(raw).decode_utf8_lossy();
                segments.push(uri_encode(&decoded));
            }
        }
    }

    let mut canonical = format!("/{}", segments.join("/"));
    if !segments.is_empty() && path.ends_with('/') {
        canonical.push('/');
    }
    canonical
}

/// Build the canonical query string.
///
/// Parameters are decoded with form-urlencoded rules, re-encoded with the
/// unreserved set, and sorted by key and then by value.
///
/// # Examples
///
/// ```
/// use escher_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(build_canonical_query_string("q=a+b&p=%2f"), "p=%2F&q=a%20b");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (uri_encode(&key), uri_encode(&value)))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical header lines for `signed_headers`, in that order.
///
/// Header names are matched case-insensitively and lower-cased. Values are
/// trimmed and runs of whitespace collapse to one space. Repeated headers
/// are joined with commas.
///
/// # Errors
///
/// Returns [`EscherError::MissingHeader`] if a signed header is absent.
pub fn build_canonical_headers(
    headers: &[(&str, &str)],
    signed_headers: &[&str],
) -> EscherResult<String> {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let lines = signed_headers
        .iter()
        .map(|name| {
            let key = name.to_ascii_lowercase();
            match header_map.get(&key) {
                Some(value) => Ok(format!("{key}:{value}")),
                None => Err(EscherError::MissingHeader(key)),
            }
        })
        .collect::<EscherResult<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

/// Join signed header names with `;`, keeping the given order.
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    signed_headers.join(";")
}

/// Percent-encode a query key or value with the unreserved set.
pub(crate) fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
