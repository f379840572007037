//! Error types for Escher signing and validation.
//!
//! Every failure is an [`EscherError`]. Callers that need to branch on the
//! category of a failure rather than the exact variant use [`EscherError::kind`].

/// Coarse classification of an [`EscherError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad URL, unparsable date, malformed auth header or query parameters.
    MalformedInput,
    /// A header that must be present or signed is not.
    MissingHeader,
    /// The declared credential scope differs from the configured one.
    ScopeMismatch,
    /// The request date lies outside the accepted time window.
    ExpiredOrFutureRequest,
    /// The key id is not in the key database.
    UnknownKeyId,
    /// The key's `acceptOnly` policy rejects the request.
    PolicyRejected,
    /// The presented signature does not match the recomputed one.
    SignatureMismatch,
    /// The hash algorithm is not supported.
    HashAlgorithmUnsupported,
}

/// Errors that can occur while signing or validating a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EscherError {
    /// The URL could not be parsed or lacks a required component.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A date could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The auth header is absent.
    #[error("the authorization header is missing")]
    MissingAuthHeader,

    /// The auth header does not follow the expected grammar.
    #[error("the authorization header is malformed")]
    InvalidAuthHeader,

    /// The algorithm prefix in the auth header or query differs from the configured one.
    #[error("the algorithm prefix is invalid: {0}")]
    InvalidAlgorithmPrefix(String),

    /// The hash algorithm is not one of the supported ones.
    #[error("unsupported hash algorithm: {0} (only SHA256 and SHA512 are allowed)")]
    UnsupportedHashAlgorithm(String),

    /// A presigned URL lacks one of its query parameters.
    #[error("missing required query parameter: {0}")]
    MissingQueryParam(String),

    /// The expiry of a presigned URL is not a non-negative integer.
    #[error("invalid expiry: {0}")]
    InvalidExpires(String),

    /// A header that has to take part in the signature is absent from the request.
    #[error("the {0} header is missing")]
    MissingHeader(String),

    /// A mandatory header is absent from the declared signed headers.
    #[error("the {0} header is not signed")]
    HeaderNotSigned(String),

    /// The date in the credential differs from the request date.
    #[error("the credential date does not match with the request date")]
    CredentialDateMismatch,

    /// The declared credential scope differs from the configured one.
    #[error("invalid credential scope")]
    InvalidCredentialScope,

    /// The request date is too old or too far in the future.
    #[error("request date is not within the accepted time window")]
    RequestDateOutOfRange,

    /// The key id is not in the key database.
    #[error("invalid key id: {0}")]
    UnknownKeyId(String),

    /// The key exists but may not be used for this algorithm or scope.
    #[error("key not accepted for this scope: {0}")]
    KeyNotAccepted(String),

    /// The presented signature does not match the recomputed one.
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl EscherError {
    /// The category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_)
            | Self::InvalidDate(_)
            | Self::InvalidConfig(_)
            | Self::MissingAuthHeader
            | Self::InvalidAuthHeader
            | Self::InvalidAlgorithmPrefix(_)
            | Self::MissingQueryParam(_)
            | Self::InvalidExpires(_)
            | Self::CredentialDateMismatch => ErrorKind::MalformedInput,
            Self::MissingHeader(_) | Self::HeaderNotSigned(_) => ErrorKind::MissingHeader,
            Self::InvalidCredentialScope => ErrorKind::ScopeMismatch,
            Self::RequestDateOutOfRange => ErrorKind::ExpiredOrFutureRequest,
            Self::UnknownKeyId(_) => ErrorKind::UnknownKeyId,
            Self::KeyNotAccepted(_) => ErrorKind::PolicyRejected,
            Self::SignatureMismatch => ErrorKind::SignatureMismatch,
            Self::UnsupportedHashAlgorithm(_) => ErrorKind::HashAlgorithmUnsupported,
        }
    }
}

/// Convenience result type for Escher operations.
pub type EscherResult<T> = Result<T, EscherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_errors_by_kind() {
        assert_eq!(
            EscherError::InvalidUrl("x".to_owned()).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            EscherError::HeaderNotSigned("host".to_owned()).kind(),
            ErrorKind::MissingHeader
        );
        assert_eq!(
            EscherError::KeyNotAccepted("k".to_owned()).kind(),
            ErrorKind::PolicyRejected
        );
        assert_eq!(
            EscherError::RequestDateOutOfRange.kind(),
            ErrorKind::ExpiredOrFutureRequest
        );
    }

    #[test]
    fn test_should_render_stable_messages() {
        assert_eq!(
            EscherError::RequestDateOutOfRange.to_string(),
            "request date is not within the accepted time window"
        );
        assert_eq!(
            EscherError::HeaderNotSigned("host".to_owned()).to_string(),
            "the host header is not signed"
        );
    }
}
