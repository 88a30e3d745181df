//! Account persistence.
//!
//! The identity flows need three primitives from storage: look an account up
//! by one field, insert a new account, and apply an [`AccountUpdate`] that
//! writes only the columns of one transition. Each update is a single-row
//! write, so a digest is never observed with a stale expiry, and an update for
//! one flow never rewrites the columns owned by another.
//!
//! - [`PgAccountStore`] backs the running service.
//! - [`MemoryAccountStore`] keeps everything in a map and counts lookups, which
//!   the test suites use to assert that malformed secrets never reach storage.

mod account;
mod memory;
mod postgres;

pub use account::{Account, AccountUpdate, PendingSecret, Role};
pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::token::Purpose;

/// Field used to resolve a single account.
#[derive(Clone, Debug)]
pub enum AccountFilter {
    Id(Uuid),
    Email(String),
    /// Account whose pending secret for `purpose` has this digest and expires after `now`.
    PendingDigest {
        purpose: Purpose,
        digest: String,
        now: DateTime<Utc>,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,
    #[error("account not found")]
    NotFound,
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve at most one account matching `filter`.
    async fn find(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError>;

    /// Insert a new account row.
    ///
    /// Returns [`StoreError::Conflict`] when another account already owns the email.
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    /// Write the columns named by `update` and stamp `updated_at = now`.
    ///
    /// Returns [`StoreError::NotFound`] if the account is gone and
    /// [`StoreError::Conflict`] if an email swap collides with another account.
    async fn update(
        &self,
        id: Uuid,
        update: &AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
