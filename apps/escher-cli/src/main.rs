//! Escher CLI - sign and validate Escher requests from the shell.
//!
//! # Usage
//!
//! ```text
//! ESCHER_CREDENTIAL_SCOPE=eu/suite/ems_request \
//! ESCHER_ACCESS_KEY_ID=suite_key_v1 ESCHER_API_SECRET=... \
//!     escher sign-url https://api.example.com/v1/report --expires 3600
//!
//! escher validate-url "api.example.com/v1/report?X-EMS-Algorithm=..." --key-db keys.json
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ESCHER_CREDENTIAL_SCOPE` | *(required)* | Credential scope |
//! | `ESCHER_HASH_ALGO` | `SHA256` | `SHA256` or `SHA512` |
//! | `ESCHER_ALGO_PREFIX` | `EMS` | Algorithm prefix |
//! | `ESCHER_VENDOR_KEY` | `EMS` | Vendor key of the presigned query parameters |
//! | `ESCHER_AUTH_HEADER_NAME` | `X-EMS-Auth` | Auth header name |
//! | `ESCHER_DATE_HEADER_NAME` | `X-EMS-Date` | Date header name |
//! | `ESCHER_CLOCK_SKEW` | `300` | Accepted clock skew in seconds |
//! | `ESCHER_ACCESS_KEY_ID` | *(unset)* | Signing key id (`--access-key-id`) |
//! | `ESCHER_API_SECRET` | *(unset)* | Signing secret (`--api-secret`) |
//! | `ESCHER_KEY_DB` | *(unset)* | Key database file (`--key-db`) |
//! | `LOG_LEVEL` | `warn` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use escher_auth::EscherConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` value.
/// Logs go to stderr so stdout carries only command output.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&log_level())?;

    let config = EscherConfig::from_env().context("invalid Escher configuration")?;
    debug!(
        hash_algo = %config.hash_algo,
        algo_prefix = %config.algo_prefix,
        credential_scope = %config.credential_scope,
        "loaded configuration",
    );

    let output = match &cli.command {
        Command::SignUrl(args) => commands::sign_url(config, args)?,
        Command::SignRequest(args) => commands::sign_request(config, args)?,
        Command::ValidateUrl(args) => commands::validate_url(config, args)?,
    };
    println!("{output}");

    Ok(())
}
