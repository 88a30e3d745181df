use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;
use tracing::debug;

use super::{AuthError, CredentialSigner};
use crate::store::{Account, AccountFilter, AccountStore, Role};

/// Validates bearer credentials against the signing key and the account store.
#[derive(Clone)]
pub struct CredentialGuard {
    signer: CredentialSigner,
    store: Arc<dyn AccountStore>,
}

impl CredentialGuard {
    #[must_use]
    pub fn new(signer: CredentialSigner, store: Arc<dyn AccountStore>) -> Self {
        Self { signer, store }
    }

    #[must_use]
    pub fn signer(&self) -> &CredentialSigner {
        &self.signer
    }

    /// Resolve the `Authorization: Bearer` header into a usable account.
    ///
    /// # Errors
    /// Returns the first rejection reason that applies, in this order: missing
    /// credential, bad signature or expiry, unknown account, unverified account,
    /// credential issued before the last password change.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Account, AuthError> {
        let credential = extract_bearer_token(headers).ok_or(AuthError::NotAuthenticated)?;
        self.authenticate_credential(&credential).await
    }

    /// # Errors
    /// See [`Self::authenticate`].
    pub async fn authenticate_credential(&self, credential: &str) -> Result<Account, AuthError> {
        let claims = self
            .signer
            .verify(credential)
            .map_err(|_| AuthError::InvalidCredential)?;

        let account = self
            .store
            .find(&AccountFilter::Id(claims.user_id))
            .await?
            .ok_or(AuthError::AccountGone)?;

        if !account.verified {
            return Err(AuthError::MustVerify);
        }

        let issued_at = claims.issued_at();
        if account
            .credential_invalidated_at
            .is_some_and(|invalidated_at| invalidated_at > issued_at)
        {
            debug!(account_id = %account.id, %issued_at, "credential predates password change");
            return Err(AuthError::CredentialInvalidated);
        }

        Ok(account)
    }
}

/// Allow the account if its role is listed; admins are always allowed.
///
/// # Errors
/// Returns [`AuthError::Forbidden`] otherwise.
pub fn require_role(account: &Account, allowed: &[Role]) -> Result<(), AuthError> {
    if account.role == Role::Admin || allowed.contains(&account.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountUpdate, MemoryAccountStore};
    use crate::token::{Purpose, TokenIssuer, DEFAULT_SECRET_TTL_SECONDS};
    use anyhow::{Context, Result};
    use axum::http::HeaderValue;
    use chrono::{DateTime, Duration, Utc};
    use secrecy::SecretString;

    const KEY: &str = "guard-test-key-guard-test-key-0123";

    struct Fixture {
        store: Arc<MemoryAccountStore>,
        guard: CredentialGuard,
    }

    fn fixture() -> Result<Fixture> {
        let store = Arc::new(MemoryAccountStore::new());
        let signer = CredentialSigner::new(&SecretString::from(KEY.to_string()), 3600)?;
        let guard = CredentialGuard::new(signer, store.clone());
        Ok(Fixture { store, guard })
    }

    async fn verified_account(store: &MemoryAccountStore) -> Result<Account> {
        let mut account = Account::new(
            "Alan".to_string(),
            "alan@example.com".to_string(),
            "hash".to_string(),
            Role::Student,
        );
        account.verified = true;
        store.put(account.clone()).await;
        Ok(account)
    }

    fn bearer(credential: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {credential}"))?,
        );
        Ok(headers)
    }

    #[tokio::test]
    async fn missing_header_is_not_authenticated() -> Result<()> {
        let fixture = fixture()?;
        let result = fixture.guard.authenticate(&HeaderMap::new()).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let result = fixture.guard.authenticate(&headers).await;
        assert!(matches!(result, Err(AuthError::NotAuthenticated)));
        Ok(())
    }

    #[tokio::test]
    async fn valid_credential_resolves_account() -> Result<()> {
        let fixture = fixture()?;
        let account = verified_account(&fixture.store).await?;
        let credential = fixture.guard.signer().issue(account.id, account.role)?;
        let resolved = fixture.guard.authenticate(&bearer(&credential)?).await?;
        assert_eq!(resolved.id, account.id);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_signature_is_invalid() -> Result<()> {
        let fixture = fixture()?;
        let account = verified_account(&fixture.store).await?;
        let other = CredentialSigner::new(
            &SecretString::from("another-key-another-key-another-key".to_string()),
            3600,
        )?;
        let credential = other.issue(account.id, Role::Admin)?;
        let result = fixture.guard.authenticate(&bearer(&credential)?).await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
        assert_eq!(fixture.store.lookups(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_account_is_gone() -> Result<()> {
        let fixture = fixture()?;
        let credential = fixture
            .guard
            .signer()
            .issue(uuid::Uuid::new_v4(), Role::Student)?;
        let result = fixture.guard.authenticate(&bearer(&credential)?).await;
        assert!(matches!(result, Err(AuthError::AccountGone)));
        Ok(())
    }

    #[tokio::test]
    async fn unverified_account_must_verify() -> Result<()> {
        let fixture = fixture()?;
        let mut account = verified_account(&fixture.store).await?;
        account.verified = false;
        fixture.store.put(account.clone()).await;
        let credential = fixture.guard.signer().issue(account.id, account.role)?;
        let result = fixture.guard.authenticate(&bearer(&credential)?).await;
        assert!(matches!(result, Err(AuthError::MustVerify)));
        Ok(())
    }

    #[tokio::test]
    async fn invalidation_time_boundary() -> Result<()> {
        let fixture = fixture()?;
        let mut account = verified_account(&fixture.store).await?;
        let issued_at: DateTime<Utc> =
            DateTime::from_timestamp_millis((Utc::now() - Duration::seconds(60)).timestamp_millis())
                .context("timestamp in range")?;
        let credential = fixture
            .guard
            .signer()
            .issue_at(account.id, account.role, issued_at)?;

        for (invalidated_at, accepted) in [
            (issued_at - Duration::seconds(30), true),
            (issued_at, true),
            (issued_at + Duration::milliseconds(1), false),
            (issued_at + Duration::seconds(1), false),
        ] {
            account.credential_invalidated_at = Some(invalidated_at);
            fixture.store.put(account.clone()).await;
            let result = fixture.guard.authenticate_credential(&credential).await;
            if accepted {
                assert!(result.is_ok(), "expected acceptance at {invalidated_at}");
            } else {
                assert!(
                    matches!(result, Err(AuthError::CredentialInvalidated)),
                    "expected rejection at {invalidated_at}"
                );
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn password_change_invalidates_older_credentials_only() -> Result<()> {
        let fixture = fixture()?;
        let account = verified_account(&fixture.store).await?;
        let before = fixture
            .guard
            .signer()
            .issue_at(account.id, account.role, Utc::now() - Duration::seconds(5))?;

        let now = Utc::now();
        fixture
            .store
            .update(
                account.id,
                &AccountUpdate::password("new-hash".to_string(), now, false),
                now,
            )
            .await?;
        let after = fixture.guard.signer().issue(account.id, account.role)?;

        assert!(matches!(
            fixture.guard.authenticate_credential(&before).await,
            Err(AuthError::CredentialInvalidated)
        ));
        assert!(fixture.guard.authenticate_credential(&after).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn secret_issued_from_stale_copy_keeps_credentials_revoked() -> Result<()> {
        let fixture = fixture()?;
        let account = verified_account(&fixture.store).await?;
        let issuer = TokenIssuer::new(fixture.store.clone(), DEFAULT_SECRET_TTL_SECONDS)?;
        let before = fixture
            .guard
            .signer()
            .issue_at(account.id, account.role, Utc::now() - Duration::seconds(5))?;

        // Forgot-password read the account, then a password change landed.
        let mut stale = account.clone();
        let now = Utc::now();
        fixture
            .store
            .update(
                account.id,
                &AccountUpdate::password("new-hash".to_string(), now, false),
                now,
            )
            .await?;
        issuer.issue(&mut stale, Purpose::Reset).await?;

        assert!(matches!(
            fixture.guard.authenticate_credential(&before).await,
            Err(AuthError::CredentialInvalidated)
        ));
        let stored = fixture.store.get(account.id).await.context("account stored")?;
        assert_eq!(stored.password_hash, "new-hash");
        Ok(())
    }

    #[test]
    fn role_requirements() {
        let mut account = Account::new(
            "Role".to_string(),
            "role@example.com".to_string(),
            "hash".to_string(),
            Role::Student,
        );
        assert!(require_role(&account, &[Role::Student]).is_ok());
        assert!(matches!(
            require_role(&account, &[Role::Instructor]),
            Err(AuthError::Forbidden)
        ));
        account.role = Role::Admin;
        assert!(require_role(&account, &[Role::Instructor]).is_ok());
    }

    #[test]
    fn bearer_extraction() -> Result<()> {
        assert_eq!(
            extract_bearer_token(&bearer("abc")?),
            Some("abc".to_string())
        );
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(extract_bearer_token(&headers), Some("xyz".to_string()));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
        Ok(())
    }
}
