//! Single-use secrets for email verification, password reset and email change.
//!
//! ## Lifecycle
//!
//! 1. [`TokenIssuer::issue`] draws 32 random bytes, hex-encodes them, stores the
//!    SHA-256 digest and an expiry (5 minutes by default) on the account in one
//!    write, and returns the raw value for out-of-band delivery.
//! 2. [`TokenIssuer::verify`] rejects anything that is not 64 lowercase hex
//!    characters without touching storage, then looks up an account whose slot
//!    for that purpose holds the same digest and has not expired.
//! 3. The caller consumes the secret with the [`AccountUpdate`](crate::store::AccountUpdate)
//!    that applies its effect (`Verified`, `Password` with `consume_reset`,
//!    `EmailChanged`); each of those clears the slot in the same write.
//!
//! Issuing again for the same purpose overwrites the slot, which invalidates the
//! previous secret. Wrong, expired and already consumed secrets all fail with
//! [`TokenError::NotFoundOrExpired`].
//!
//! > **Note:** the consuming write is not conditioned on the digest still being
//! > present, so two concurrent verifications of the same live secret can both
//! > observe success before either clears it.

mod issuer;
mod purpose;
mod secret;

pub use issuer::{
    IssuedSecret, TokenIssuer, DEFAULT_SECRET_TTL_SECONDS, MAX_SECRET_TTL_SECONDS,
};
pub use purpose::Purpose;
pub use secret::{digest_secret, generate_secret, is_well_formed, SECRET_HEX_LEN};

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    InvalidInput,
    #[error("invalid or expired token")]
    NotFoundOrExpired,
    #[error("failed to deliver {0} email")]
    DeliveryFailure(Purpose),
    #[error("failed to gather entropy for token")]
    Entropy,
    #[error("secret lifetime must be between 1 and {MAX_SECRET_TTL_SECONDS} seconds, got {0}")]
    InvalidTtl(i64),
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
    #[error(transparent)]
    Store(#[from] StoreError),
}
