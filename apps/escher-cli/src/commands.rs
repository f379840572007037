//! Subcommand implementations.
//!
//! Each handler takes the resolved configuration and its parsed arguments and
//! returns the text to print, so `main` stays a thin dispatcher.

use std::path::Path;

use anyhow::{Context, Result};
use escher_auth::{
    EscherConfig, EscherRequest, EscherSigner, EscherValidator, SignOptions, StaticKeyDatabase,
    ValidateOptions,
};
use tracing::info;

use crate::cli::{CredentialArgs, SignRequestArgs, SignUrlArgs, ValidateUrlArgs};

fn signer(config: EscherConfig, credentials: &CredentialArgs) -> EscherSigner {
    EscherSigner::new(
        config,
        credentials.access_key_id.as_str(),
        credentials.api_secret.as_str(),
    )
}

/// Presign a URL.
pub fn sign_url(config: EscherConfig, args: &SignUrlArgs) -> Result<String> {
    let options = SignOptions {
        headers_to_sign: Vec::new(),
        date: args.date,
        expires: args.expires,
    };
    let url = signer(config, &args.credentials)
        .sign_url(&args.method, &args.url, &options)
        .with_context(|| format!("failed to presign {}", args.url))?;

    info!(method = %args.method, expires = args.expires, "presigned URL");
    Ok(url)
}

/// Sign a request and render the headers to send with it.
pub fn sign_request(config: EscherConfig, args: &SignRequestArgs) -> Result<String> {
    let body = match (&args.data, &args.data_file) {
        (Some(data), _) => data.clone().into_bytes(),
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("failed to read request body from {}", path.display()))?,
        (None, None) => Vec::new(),
    };

    let mut request = EscherRequest::new(args.method.as_str(), args.url.as_str()).with_body(body);
    request.headers.clone_from(&args.headers);

    let options = SignOptions {
        headers_to_sign: args.sign_headers.clone(),
        date: args.date,
        expires: escher_auth::config::DEFAULT_EXPIRES,
    };
    let headers = signer(config, &args.credentials)
        .sign_request(&request, &options)
        .with_context(|| format!("failed to sign {} {}", args.method, args.url))?;

    info!(method = %args.method, headers = headers.len(), "signed request");
    render_headers(&headers, args.json)
}

fn render_headers(headers: &[(String, String)], json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(headers).context("failed to encode headers as JSON");
    }
    Ok(headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Load a JSON key database file.
pub fn load_key_db(path: &Path) -> Result<StaticKeyDatabase> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key database {}", path.display()))?;
    let db = StaticKeyDatabase::from_json(&raw)
        .with_context(|| format!("invalid key database {}", path.display()))?;
    info!(path = %path.display(), keys = db.len(), "loaded key database");
    Ok(db)
}

/// Validate a presigned URL and return the key id it was signed with.
pub fn validate_url(config: EscherConfig, args: &ValidateUrlArgs) -> Result<String> {
    let validator = EscherValidator::new(config, load_key_db(&args.key_db)?);
    let options = ValidateOptions {
        headers_to_sign: args.require_headers.clone(),
        now: args.now,
        expires: args.expires,
    };

    let key_id = validator
        .validate_url(&args.method, &args.url, &args.headers, &options)
        .context("URL validation failed")?;

    info!(%key_id, "URL is valid");
    Ok(key_id)
}
