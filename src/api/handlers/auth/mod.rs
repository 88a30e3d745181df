//! Auth handlers and supporting modules.
//!
//! This module covers registration, email verification, password login,
//! password reset/change and email change.
//!
//! ## Single-use secrets
//!
//! Verification, reset and email-change links carry a 64-character hex secret.
//! Only its SHA-256 digest and a 5-minute expiry are stored on the account. Any
//! failure to match (malformed, unknown, wrong, expired, already used) returns
//! the same `400 invalid or expired token`.
//!
//! ## Bearer credentials
//!
//! Login, reset and password change return an HS256 credential. Protected
//! routes are wrapped in [`principal::require_account`], which rejects the
//! credential if the password changed after it was issued.

pub(crate) mod email_change;
mod errors;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod register;
mod state;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use principal::require_account;
pub use state::{AuthConfig, AuthState};
pub(crate) use errors::{auth_error_response, internal_error};
pub(crate) use utils::normalize_name;
