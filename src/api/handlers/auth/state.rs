//! Auth state and configuration shared by every handler.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;

use crate::api::email::EmailSender;
use crate::credential::{CredentialGuard, CredentialSigner, DEFAULT_CREDENTIAL_TTL_SECONDS};
use crate::store::AccountStore;
use crate::token::{TokenIssuer, DEFAULT_SECRET_TTL_SECONDS};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    secret_ttl_seconds: i64,
    credential_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            secret_ttl_seconds: DEFAULT_SECRET_TTL_SECONDS,
            credential_ttl_seconds: DEFAULT_CREDENTIAL_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_secret_ttl_seconds(mut self, seconds: i64) -> Self {
        self.secret_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_credential_ttl_seconds(mut self, seconds: i64) -> Self {
        self.credential_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn secret_ttl_seconds(&self) -> i64 {
        self.secret_ttl_seconds
    }

    #[must_use]
    pub fn credential_ttl_seconds(&self) -> i64 {
        self.credential_ttl_seconds
    }
}

/// Everything a handler needs, built once at startup.
pub struct AuthState {
    config: AuthConfig,
    store: Arc<dyn AccountStore>,
    issuer: TokenIssuer,
    guard: CredentialGuard,
    email: Arc<dyn EmailSender>,
}

impl AuthState {
    /// The signing key is only read here; afterwards it lives inside the signer.
    ///
    /// # Errors
    /// Returns an error if the key is too short or either lifetime is out of range.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn AccountStore>,
        signing_key: &SecretString,
        email: Arc<dyn EmailSender>,
    ) -> Result<Self> {
        let signer = CredentialSigner::new(signing_key, config.credential_ttl_seconds())
            .context("Invalid credential settings")?;
        let issuer = TokenIssuer::new(store.clone(), config.secret_ttl_seconds())
            .context("Invalid secret settings")?;
        let guard = CredentialGuard::new(signer, store.clone());
        Ok(Self {
            config,
            store,
            issuer,
            guard,
            email,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn guard(&self) -> &CredentialGuard {
        &self.guard
    }

    #[must_use]
    pub fn email(&self) -> &dyn EmailSender {
        self.email.as_ref()
    }
}
