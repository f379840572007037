//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use escher_auth::config::DEFAULT_EXPIRES;

/// Sign and validate Escher requests.
#[derive(Debug, Parser)]
#[command(name = "escher", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Presign a URL so it can be used without an auth header.
    SignUrl(SignUrlArgs),
    /// Sign a request and print the headers to send with it.
    SignRequest(SignRequestArgs),
    /// Validate a presigned URL against a key database.
    ValidateUrl(ValidateUrlArgs),
}

/// Signing credentials.
#[derive(Debug, Clone, Args)]
pub struct CredentialArgs {
    /// Access key id placed in the credential.
    #[arg(long, env = "ESCHER_ACCESS_KEY_ID")]
    pub access_key_id: String,

    /// Secret the signing key is derived from.
    #[arg(long, env = "ESCHER_API_SECRET", hide_env_values = true)]
    pub api_secret: String,
}

/// Arguments of `escher sign-url`.
#[derive(Debug, Clone, Args)]
pub struct SignUrlArgs {
    /// Absolute URL to presign.
    pub url: String,

    /// HTTP method the URL will be requested with.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Validity of the URL in seconds.
    #[arg(long, default_value_t = DEFAULT_EXPIRES)]
    pub expires: u64,

    /// Signing time (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub date: Option<DateTime<Utc>>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments of `escher sign-request`.
#[derive(Debug, Clone, Args)]
pub struct SignRequestArgs {
    /// Request target: an absolute URL, or a path with `--header "Host: ..."`.
    pub url: String,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Request header as `Name: value`. May be repeated.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body.
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body from a file.
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// Header to sign. May be repeated; all headers are signed when omitted.
    #[arg(long = "sign-header")]
    pub sign_headers: Vec<String>,

    /// Signing time (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub date: Option<DateTime<Utc>>,

    /// Print the headers as a JSON array of `[name, value]` pairs.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments of `escher validate-url`.
#[derive(Debug, Clone, Args)]
pub struct ValidateUrlArgs {
    /// Presigned URL. The scheme may be omitted.
    pub url: String,

    /// HTTP method the URL was requested with.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// JSON key database: an array of `{keyId, secret, acceptOnly}` records.
    #[arg(long, env = "ESCHER_KEY_DB")]
    pub key_db: PathBuf,

    /// Request header as `Name: value`. May be repeated.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Header that must be covered by the signature. May be repeated.
    #[arg(long = "require-header")]
    pub require_headers: Vec<String>,

    /// Expiry in seconds for URLs that carry none.
    #[arg(long, default_value_t = DEFAULT_EXPIRES)]
    pub expires: u64,

    /// Validation time (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub now: Option<DateTime<Utc>>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in `{raw}`"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp `{raw}`: {e}"))
}
