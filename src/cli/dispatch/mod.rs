use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth::Options;
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth = Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth.jwt_secret,
        jwt_ttl_seconds: auth.jwt_ttl_seconds,
        secret_ttl_seconds: auth.secret_ttl_seconds,
        frontend_base_url: auth.frontend_base_url,
    }))
}
