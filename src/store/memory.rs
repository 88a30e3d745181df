//! In-memory account store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Account, AccountFilter, AccountStore, AccountUpdate, StoreError};

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
    lookups: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `find` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `insert` and `update` calls served so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Store `account` as-is, replacing any row with the same id. Fixture
    /// helper for tests that need a record in a specific state; not counted
    /// as a write.
    pub async fn put(&self, account: Account) {
        self.accounts.lock().await.insert(account.id, account);
    }

    pub async fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().await;
        let found = match filter {
            AccountFilter::Id(id) => accounts.get(id).cloned(),
            AccountFilter::Email(email) => accounts
                .values()
                .find(|account| account.email == *email)
                .cloned(),
            AccountFilter::PendingDigest {
                purpose,
                digest,
                now,
            } => accounts
                .values()
                .find(|account| {
                    account
                        .pending(*purpose)
                        .is_some_and(|pending| pending.digest == *digest && pending.is_live_at(*now))
                })
                .cloned(),
        };
        Ok(found)
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().await;
        if accounts
            .values()
            .any(|other| other.id == account.id || other.email == account.email)
        {
            return Err(StoreError::Conflict);
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        update: &AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().await;
        if let AccountUpdate::EmailChanged { email } = update {
            if accounts
                .values()
                .any(|other| other.id != id && other.email == *email)
            {
                return Err(StoreError::Conflict);
            }
        }
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.apply(update, now);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PendingSecret, Role};
    use crate::token::Purpose;
    use anyhow::{Context, Result};
    use chrono::Duration;

    fn account(email: &str) -> Account {
        Account::new(
            "Test".to_string(),
            email.to_string(),
            "hash".to_string(),
            Role::Student,
        )
    }

    #[tokio::test]
    async fn insert_then_find_by_id_and_email() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = account("a@example.com");
        store.insert(&account).await?;

        let by_id = store.find(&AccountFilter::Id(account.id)).await?;
        assert_eq!(by_id.map(|a| a.email), Some("a@example.com".to_string()));

        let by_email = store
            .find(&AccountFilter::Email("a@example.com".to_string()))
            .await?;
        assert_eq!(by_email.map(|a| a.id), Some(account.id));
        assert_eq!(store.lookups(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() -> Result<()> {
        let store = MemoryAccountStore::new();
        store.insert(&account("dup@example.com")).await?;
        let result = store.insert(&account("dup@example.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        Ok(())
    }

    #[tokio::test]
    async fn update_writes_only_its_own_columns() -> Result<()> {
        let store = MemoryAccountStore::new();
        let account = account("u@example.com");
        store.insert(&account).await?;

        let now = Utc::now();
        store
            .update(
                account.id,
                &AccountUpdate::password("fresh-hash".to_string(), now, false),
                now,
            )
            .await?;
        // A stale copy renaming the account must not bring the old hash back.
        store
            .update(account.id, &AccountUpdate::Name("Renamed".to_string()), now)
            .await?;

        let stored = store.get(account.id).await.context("account stored")?;
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.password_hash, "fresh-hash");
        assert!(stored.credential_invalidated_at.is_some());
        assert_eq!(store.writes(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn update_reports_missing_account_and_email_conflicts() -> Result<()> {
        let store = MemoryAccountStore::new();
        let first = account("one@example.com");
        let second = account("two@example.com");
        store.insert(&first).await?;
        store.insert(&second).await?;

        let result = store
            .update(uuid::Uuid::new_v4(), &AccountUpdate::Verified, Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));

        let result = store
            .update(
                first.id,
                &AccountUpdate::EmailChanged {
                    email: "two@example.com".to_string(),
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        let stored = store.get(first.id).await.context("account stored")?;
        assert_eq!(stored.email, "one@example.com");
        Ok(())
    }

    #[tokio::test]
    async fn pending_digest_lookup_ignores_expired_and_other_purposes() -> Result<()> {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        let mut account = account("p@example.com");
        account.reset = Some(PendingSecret {
            digest: "abc".to_string(),
            expires_at: now + Duration::seconds(10),
        });
        store.insert(&account).await?;

        let live = store
            .find(&AccountFilter::PendingDigest {
                purpose: Purpose::Reset,
                digest: "abc".to_string(),
                now,
            })
            .await?;
        assert!(live.is_some());

        let other_purpose = store
            .find(&AccountFilter::PendingDigest {
                purpose: Purpose::Verification,
                digest: "abc".to_string(),
                now,
            })
            .await?;
        assert!(other_purpose.is_none());

        let expired = store
            .find(&AccountFilter::PendingDigest {
                purpose: Purpose::Reset,
                digest: "abc".to_string(),
                now: now + Duration::seconds(10),
            })
            .await?;
        assert!(expired.is_none());
        Ok(())
    }
}
