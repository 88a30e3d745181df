//! Bearer credentials.
//!
//! A credential is an HS256-signed JWT minted at login (and after a password
//! change or reset). Every protected request runs it through
//! [`CredentialGuard::authenticate`], which checks the signature and expiry,
//! reloads the account and compares the credential's issued-at instant with
//! the account's `credential_invalidated_at`. A credential issued at exactly
//! the invalidation instant is still accepted.

mod claims;
mod guard;
mod signer;

pub use claims::Claims;
pub use guard::{require_role, CredentialGuard};
pub use signer::{
    CredentialSigner, DEFAULT_CREDENTIAL_TTL_SECONDS, MAX_CREDENTIAL_TTL_SECONDS, MIN_KEY_BYTES,
};

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to sign credential")]
    Signing,
    #[error("invalid or expired credential")]
    Invalid,
    #[error("signing key must be at least {MIN_KEY_BYTES} bytes")]
    WeakKey,
    #[error("credential lifetime must be between 1 and {MAX_CREDENTIAL_TTL_SECONDS} seconds, got {0}")]
    InvalidTtl(i64),
}

/// Reasons a protected request is turned away.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid or expired credential")]
    InvalidCredential,
    #[error("account no longer exists")]
    AccountGone,
    #[error("must verify account")]
    MustVerify,
    #[error("password changed, re-authenticate")]
    CredentialInvalidated,
    #[error("insufficient role")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}
