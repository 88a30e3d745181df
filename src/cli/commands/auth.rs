use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::credential::{
    DEFAULT_CREDENTIAL_TTL_SECONDS, MAX_CREDENTIAL_TTL_SECONDS, MIN_KEY_BYTES,
};
use crate::token::{DEFAULT_SECRET_TTL_SECONDS, MAX_SECRET_TTL_SECONDS};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_TTL_SECONDS: &str = "jwt-ttl-seconds";
pub const ARG_SECRET_TTL_SECONDS: &str = "secret-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HS256 signing key for bearer credentials (at least 32 bytes)")
                .env("IDENTITY_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_TTL_SECONDS)
                .long(ARG_JWT_TTL_SECONDS)
                .help("Bearer credential lifetime in seconds")
                .env("IDENTITY_JWT_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_CREDENTIAL_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SECRET_TTL_SECONDS)
                .long(ARG_SECRET_TTL_SECONDS)
                .help("Lifetime of emailed verification/reset/email-change secrets in seconds")
                .env("IDENTITY_SECRET_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SECRET_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for emailed links and CORS")
                .env("IDENTITY_FRONTEND_BASE_URL")
                .default_value("https://learn.example.com"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: i64,
    pub secret_ttl_seconds: i64,
    pub frontend_base_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a required value is missing or the signing key is too short.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;
        if jwt_secret.len() < MIN_KEY_BYTES {
            return Err(anyhow!("--jwt-secret must be at least {MIN_KEY_BYTES} bytes"));
        }

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            jwt_ttl_seconds: matches
                .get_one::<i64>(ARG_JWT_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_CREDENTIAL_TTL_SECONDS),
            secret_ttl_seconds: matches
                .get_one::<i64>(ARG_SECRET_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SECRET_TTL_SECONDS),
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
        })
    }
}
