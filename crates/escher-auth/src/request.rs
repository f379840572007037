//! The request representation shared by the signer and validator.

use http::Uri;

use crate::error::{EscherError, EscherResult};

/// An HTTP request as seen by the engine.
///
/// `url` is either origin-form (`/path?query`) or absolute
/// (`https://host/path?query`). Header names keep the caller's casing; all
/// lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EscherRequest {
    /// HTTP method.
    pub method: String,
    /// Request target.
    pub url: String,
    /// Header name/value pairs in caller order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl EscherRequest {
    /// Create a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Build a request from `http` request parts and an already collected body.
    ///
    /// Header values that are not valid UTF-8 are skipped; a signed header
    /// among them then fails validation as missing.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts, body: impl Into<Vec<u8>>) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());

        let mut headers: Vec<(String, String)> = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();

        // HTTP/2 requests carry the host in the URI authority only.
        if !parts.headers.contains_key(http::header::HOST) {
            if let Some(authority) = parts.uri.authority() {
                headers.push(("host".to_owned(), authority.as_str().to_owned()));
            }
        }

        Self {
            method: parts.method.as_str().to_owned(),
            url,
            headers,
            body: body.into(),
        }
    }

    /// First value of the named header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the named header is present.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Headers as borrowed pairs, the shape the canonical builder takes.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// The components of a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Scheme, for absolute URLs.
    pub scheme: Option<String>,
    /// `host[:port]`, for absolute URLs.
    pub authority: Option<String>,
    /// Path, `/` when empty.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: String,
}

impl UrlParts {
    /// `path` or `path?query`.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

/// Split a URL into its components.
///
/// # Errors
///
/// Returns [`EscherError::InvalidUrl`] if the URL cannot be parsed.
///
/// # Examples
///
/// ```
/// use escher_auth::request::parse_url;
///
/// let parts = parse_url("http://localhost:3000/check_signature?a=1").unwrap();
/// assert_eq!(parts.authority.as_deref(), Some("localhost:3000"));
/// assert_eq!(parts.path, "/check_signature");
/// assert_eq!(parts.query, "a=1");
/// ```
pub fn parse_url(url: &str) -> EscherResult<UrlParts> {
    // A fragment never reaches the server, so it takes no part in signing.
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    let uri: Uri = without_fragment
        .parse()
        .map_err(|e: http::uri::InvalidUri| EscherError::InvalidUrl(format!("{url}: {e}")))?;

    let authority = uri.authority().map(|a| {
        a.as_str()
            .rsplit_once('@')
            .map_or(a.as_str(), |(_, host)| host)
            .to_owned()
    });
    let path = if uri.path().is_empty() {
        "/".to_owned()
    } else {
        uri.path().to_owned()
    };

    Ok(UrlParts {
        scheme: uri.scheme_str().map(ToOwned::to_owned),
        authority,
        path,
        query: uri.query().unwrap_or("").to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_origin_form_url() {
        let parts = parse_url("/check-signed-request?b=2&a=1").unwrap();
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.authority, None);
        assert_eq!(parts.path, "/check-signed-request");
        assert_eq!(parts.query, "b=2&a=1");
        assert_eq!(parts.path_and_query(), "/check-signed-request?b=2&a=1");
    }

    #[test]
    fn test_should_parse_absolute_url_and_drop_fragment() {
        let parts = parse_url("https://user@example.com:8443/a/b?x=1#frag").unwrap();
        assert_eq!(parts.scheme.as_deref(), Some("https"));
        assert_eq!(parts.authority.as_deref(), Some("example.com:8443"));
        assert_eq!(parts.path, "/a/b");
        assert_eq!(parts.query, "x=1");
    }

    #[test]
    fn test_should_reject_malformed_url() {
        assert!(matches!(
            parse_url("http://exa mple.com/"),
            Err(EscherError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_should_look_up_headers_case_insensitively() {
        let request = EscherRequest::new("GET", "/")
            .with_header("Host", "example.com")
            .with_header("X-EMS-Date", "20110909T233600Z");
        assert_eq!(request.header("host"), Some("example.com"));
        assert_eq!(request.header("x-ems-date"), Some("20110909T233600Z"));
        assert!(!request.has_header("x-ems-auth"));
    }

    #[test]
    fn test_should_build_request_from_http_parts() {
        let (parts, _body) = http::Request::builder()
            .method("POST")
            .uri("http://localhost:5000/check-signed-request?x=1")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();

        let request = EscherRequest::from_parts(&parts, b"{\"id\":42}".to_vec());
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "/check-signed-request?x=1");
        assert_eq!(request.header("host"), Some("localhost:5000"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body, b"{\"id\":42}");
    }
}
