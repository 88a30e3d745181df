use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

use super::secret::{digest_secret, generate_secret, is_well_formed};
use super::{Purpose, TokenError};
use crate::store::{Account, AccountFilter, AccountStore, AccountUpdate, PendingSecret};

pub const DEFAULT_SECRET_TTL_SECONDS: i64 = 5 * 60;

/// Upper bound for a secret lifetime: one day.
pub const MAX_SECRET_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Raw secret plus the expiry written next to its digest.
#[derive(Debug)]
pub struct IssuedSecret {
    pub secret: SecretString,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn AccountStore>,
    ttl: Duration,
}

impl TokenIssuer {
    /// # Errors
    /// Returns [`TokenError::InvalidTtl`] unless `1 <= ttl_seconds <= MAX_SECRET_TTL_SECONDS`.
    pub fn new(store: Arc<dyn AccountStore>, ttl_seconds: i64) -> Result<Self, TokenError> {
        if !(1..=MAX_SECRET_TTL_SECONDS).contains(&ttl_seconds) {
            return Err(TokenError::InvalidTtl(ttl_seconds));
        }
        Ok(Self {
            store,
            ttl: Duration::seconds(ttl_seconds),
        })
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a secret for `purpose` and persist its digest on `account`.
    ///
    /// # Errors
    /// Returns an error if the RNG fails or the account cannot be written.
    pub async fn issue(
        &self,
        account: &mut Account,
        purpose: Purpose,
    ) -> Result<IssuedSecret, TokenError> {
        self.issue_at(account, purpose, Utc::now()).await
    }

    /// Same as [`Self::issue`] with an explicit issuance time.
    ///
    /// Only the slot for `purpose` is written (plus the pending address for an
    /// email change), so a copy of `account` read before a concurrent password
    /// change cannot undo it.
    ///
    /// # Errors
    /// Returns an error if the RNG fails, the expiry overflows or the account
    /// cannot be written.
    pub async fn issue_at(
        &self,
        account: &mut Account,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> Result<IssuedSecret, TokenError> {
        let (issued, pending) = self.mint(now)?;

        // Overwrites any earlier secret for the same purpose.
        let update = AccountUpdate::Pending {
            purpose,
            secret: Some(pending),
            pending_email: account.pending_email.clone(),
        };
        self.store.update(account.id, &update, now).await?;
        account.apply(&update, now);

        debug!(account_id = %account.id, %purpose, expires_at = %issued.expires_at, "issued pending secret");

        Ok(issued)
    }

    /// Mint a secret for an account that is not stored yet and insert the
    /// account with the digest already in its slot.
    ///
    /// # Errors
    /// [`TokenError::Store`] wrapping [`StoreError::Conflict`](crate::store::StoreError::Conflict)
    /// if the email is taken, or any error from [`Self::issue_at`].
    pub async fn issue_with_insert(
        &self,
        account: &mut Account,
        purpose: Purpose,
    ) -> Result<IssuedSecret, TokenError> {
        let now = Utc::now();
        let (issued, pending) = self.mint(now)?;
        *account.pending_mut(purpose) = Some(pending);
        account.updated_at = now;
        self.store.insert(account).await?;

        debug!(account_id = %account.id, %purpose, expires_at = %issued.expires_at, "issued pending secret");

        Ok(issued)
    }

    fn mint(&self, now: DateTime<Utc>) -> Result<(IssuedSecret, PendingSecret), TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let secret = generate_secret()?;
        let pending = PendingSecret {
            digest: digest_secret(secret.expose_secret()),
            expires_at,
        };
        Ok((IssuedSecret { secret, expires_at }, pending))
    }

    /// Resolve the account holding a live secret for `purpose`.
    ///
    /// # Errors
    /// [`TokenError::InvalidInput`] for malformed input, [`TokenError::NotFoundOrExpired`]
    /// when nothing matches.
    pub async fn verify(&self, purpose: Purpose, presented: &str) -> Result<Account, TokenError> {
        self.verify_at(purpose, presented, Utc::now()).await
    }

    /// Same as [`Self::verify`] evaluated at `now`.
    ///
    /// # Errors
    /// [`TokenError::InvalidInput`] for malformed input, [`TokenError::NotFoundOrExpired`]
    /// when nothing matches.
    pub async fn verify_at(
        &self,
        purpose: Purpose,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, TokenError> {
        if !is_well_formed(presented) {
            return Err(TokenError::InvalidInput);
        }

        let filter = AccountFilter::PendingDigest {
            purpose,
            digest: digest_secret(presented),
            now,
        };
        self.store
            .find(&filter)
            .await?
            .ok_or(TokenError::NotFoundOrExpired)
    }

    /// Drop a pending secret that was just issued, e.g. when its email could
    /// not be sent. Revoking an email change also drops the pending address.
    ///
    /// # Errors
    /// Returns an error if the account cannot be written.
    pub async fn revoke(&self, account: &mut Account, purpose: Purpose) -> Result<(), TokenError> {
        if account.pending(purpose).is_none() {
            return Ok(());
        }
        let now = Utc::now();
        let update = AccountUpdate::Pending {
            purpose,
            secret: None,
            pending_email: None,
        };
        self.store.update(account.id, &update, now).await?;
        account.apply(&update, now);
        debug!(account_id = %account.id, %purpose, "revoked pending secret");
        Ok(())
    }
}
