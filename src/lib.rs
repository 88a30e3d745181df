//! # Identity
//!
//! `identity` owns user accounts for the learning platform: registration,
//! email verification, login, password reset and change, email change, and
//! the profile of the signed-in user.
//!
//! ## Credentials
//!
//! Login returns an HS256 bearer credential carrying `userId` and `role`. Every
//! protected request re-reads the account, so a credential stops working when
//! the account is deleted, loses verification, or changes its password after
//! the credential was issued.
//!
//! ## Single-use secrets
//!
//! Verification, reset and email-change links carry a 64 character hex secret.
//! Only its SHA-256 digest and an expiry are stored; see [`token`].
//!
//! ## Passwords
//!
//! Passwords are hashed with Argon2id on the blocking pool; see [`password`].

pub mod api;
pub mod cli;
pub mod credential;
pub mod password;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
