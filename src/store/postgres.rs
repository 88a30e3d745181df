//! Postgres-backed account store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
    Connection, PgPool, Postgres, Row,
};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    Account, AccountFilter, AccountStore, AccountUpdate, PendingSecret, Role, StoreError,
};
use crate::token::Purpose;

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, verified, \
    credential_invalidated_at, verification_token_hash, verification_token_expires_at, \
    reset_token_hash, reset_token_expires_at, email_change_token_hash, \
    email_change_token_expires_at, pending_email, created_at, updated_at";

const INSERT_ACCOUNT: &str = r"
    INSERT INTO accounts
        (id, name, email, password_hash, role, verified, credential_invalidated_at,
         verification_token_hash, verification_token_expires_at,
         reset_token_hash, reset_token_expires_at,
         email_change_token_hash, email_change_token_expires_at,
         pending_email, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
";

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small connection pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }
}

/// Build the `SELECT` used for a filter. Column names come from a fixed table,
/// never from user input.
fn select_query(filter: &AccountFilter) -> String {
    match filter {
        AccountFilter::Id(_) => format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"),
        AccountFilter::Email(_) => {
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1")
        }
        AccountFilter::PendingDigest { purpose, .. } => {
            let (digest_column, expiry_column) = purpose.columns();
            format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {digest_column} = $1 AND {expiry_column} > $2"
            )
        }
    }
}

/// Build the `UPDATE` for one transition. `$1` is the id and `$2` the
/// `updated_at` stamp; the remaining parameters follow [`bind_update`].
fn update_query(update: &AccountUpdate) -> String {
    let set = match update {
        AccountUpdate::Name(_) => "name = $3".to_string(),
        AccountUpdate::Pending { purpose, .. } => {
            let (digest_column, expiry_column) = purpose.columns();
            if *purpose == Purpose::EmailChange {
                format!("{digest_column} = $3, {expiry_column} = $4, pending_email = $5")
            } else {
                format!("{digest_column} = $3, {expiry_column} = $4")
            }
        }
        AccountUpdate::Verified => {
            let (digest_column, expiry_column) = Purpose::Verification.columns();
            format!("verified = TRUE, {digest_column} = NULL, {expiry_column} = NULL")
        }
        AccountUpdate::Password { consume_reset, .. } => {
            let mut set = "password_hash = $3, credential_invalidated_at = $4".to_string();
            if *consume_reset {
                let (digest_column, expiry_column) = Purpose::Reset.columns();
                set.push_str(&format!(", {digest_column} = NULL, {expiry_column} = NULL"));
            }
            set
        }
        AccountUpdate::EmailChanged { .. } => {
            let (digest_column, expiry_column) = Purpose::EmailChange.columns();
            format!(
                "email = $3, pending_email = NULL, {digest_column} = NULL, {expiry_column} = NULL"
            )
        }
    };
    format!("UPDATE accounts SET {set}, updated_at = $2 WHERE id = $1")
}

fn bind_update<'q>(
    statement: Query<'q, Postgres, PgArguments>,
    update: &'q AccountUpdate,
) -> Query<'q, Postgres, PgArguments> {
    match update {
        AccountUpdate::Name(name) => statement.bind(name.as_str()),
        AccountUpdate::Pending {
            purpose,
            secret,
            pending_email,
        } => {
            let statement = statement
                .bind(secret.as_ref().map(|s| s.digest.as_str()))
                .bind(secret.as_ref().map(|s| s.expires_at));
            if *purpose == Purpose::EmailChange {
                statement.bind(pending_email.as_deref())
            } else {
                statement
            }
        }
        AccountUpdate::Verified => statement,
        AccountUpdate::Password {
            password_hash,
            invalidated_at,
            ..
        } => statement.bind(password_hash.as_str()).bind(*invalidated_at),
        AccountUpdate::EmailChanged { email } => statement.bind(email.as_str()),
    }
}

fn write_result(
    result: Result<sqlx::postgres::PgQueryResult, sqlx::Error>,
) -> Result<u64, StoreError> {
    match result {
        Ok(done) => Ok(done.rows_affected()),
        Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
        Err(err) => Err(StoreError::Database(err)),
    }
}

fn pending_from_row(row: &PgRow, purpose: Purpose) -> Result<Option<PendingSecret>, sqlx::Error> {
    let (digest_column, expiry_column) = purpose.columns();
    let digest: Option<String> = row.try_get(digest_column)?;
    let expires_at: Option<DateTime<Utc>> = row.try_get(expiry_column)?;
    Ok(match (digest, expires_at) {
        (Some(digest), Some(expires_at)) => Some(PendingSecret { digest, expires_at }),
        _ => None,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let role = role
        .parse::<Role>()
        .map_err(|err| sqlx::Error::Decode(err.into()))?;

    Ok(Account {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        verified: row.try_get("verified")?,
        credential_invalidated_at: row.try_get("credential_invalidated_at")?,
        verification: pending_from_row(row, Purpose::Verification)?,
        reset: pending_from_row(row, Purpose::Reset)?,
        email_change: pending_from_row(row, Purpose::EmailChange)?,
        pending_email: row.try_get("pending_email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        let query = select_query(filter);
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let statement = sqlx::query(&query);
        let statement = match filter {
            AccountFilter::Id(id) => statement.bind(*id),
            AccountFilter::Email(email) => statement.bind(email.as_str()),
            AccountFilter::PendingDigest { digest, now, .. } => {
                statement.bind(digest.as_str()).bind(*now)
            }
        };
        let row = statement
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = INSERT_ACCOUNT
        );
        let digest = |purpose: Purpose| account.pending(purpose).map(|p| p.digest.as_str());
        let expiry = |purpose: Purpose| account.pending(purpose).map(|p| p.expires_at);

        let result = sqlx::query(INSERT_ACCOUNT)
            .bind(account.id)
            .bind(account.name.as_str())
            .bind(account.email.as_str())
            .bind(account.password_hash.as_str())
            .bind(account.role.as_str())
            .bind(account.verified)
            .bind(account.credential_invalidated_at)
            .bind(digest(Purpose::Verification))
            .bind(expiry(Purpose::Verification))
            .bind(digest(Purpose::Reset))
            .bind(expiry(Purpose::Reset))
            .bind(digest(Purpose::EmailChange))
            .bind(expiry(Purpose::EmailChange))
            .bind(account.pending_email.as_deref())
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        write_result(result).map(|_| ())
    }

    async fn update(
        &self,
        id: Uuid,
        update: &AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let query = update_query(update);
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let statement = sqlx::query(&query).bind(id).bind(now);
        let result = bind_update(statement, update)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match write_result(result)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn pending_digest_query_uses_purpose_columns() {
        let query = select_query(&AccountFilter::PendingDigest {
            purpose: Purpose::EmailChange,
            digest: "x".to_string(),
            now: Utc::now(),
        });
        assert!(query.ends_with(
            "WHERE email_change_token_hash = $1 AND email_change_token_expires_at > $2"
        ));
    }

    #[test]
    fn lookup_queries_select_every_column() {
        for filter in [
            AccountFilter::Id(uuid::Uuid::nil()),
            AccountFilter::Email("a@example.com".to_string()),
        ] {
            let query = select_query(&filter);
            assert!(query.starts_with(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts")));
        }
    }

    #[test]
    fn password_update_leaves_other_columns_alone() {
        let now = Utc::now();
        let query = update_query(&AccountUpdate::password("h".to_string(), now, false));
        assert_eq!(
            query,
            "UPDATE accounts SET password_hash = $3, credential_invalidated_at = $4, \
             updated_at = $2 WHERE id = $1"
        );

        let query = update_query(&AccountUpdate::password("h".to_string(), now, true));
        assert!(query.contains("reset_token_hash = NULL, reset_token_expires_at = NULL"));
        assert!(!query.contains("verification_token_hash"));
    }

    #[test]
    fn pending_update_writes_only_its_purpose_columns() {
        let query = update_query(&AccountUpdate::Pending {
            purpose: Purpose::Reset,
            secret: None,
            pending_email: None,
        });
        assert_eq!(
            query,
            "UPDATE accounts SET reset_token_hash = $3, reset_token_expires_at = $4, \
             updated_at = $2 WHERE id = $1"
        );
        assert!(!query.contains("password_hash"));

        let query = update_query(&AccountUpdate::Pending {
            purpose: Purpose::EmailChange,
            secret: None,
            pending_email: None,
        });
        assert!(query.contains("pending_email = $5"));
    }

    #[test]
    fn profile_and_email_updates_touch_their_own_columns() {
        let query = update_query(&AccountUpdate::Name("n".to_string()));
        assert_eq!(
            query,
            "UPDATE accounts SET name = $3, updated_at = $2 WHERE id = $1"
        );

        let query = update_query(&AccountUpdate::EmailChanged {
            email: "e@example.com".to_string(),
        });
        assert!(query.starts_with("UPDATE accounts SET email = $3, pending_email = NULL"));
        assert!(!query.contains("password_hash"));

        let query = update_query(&AccountUpdate::Verified);
        assert!(query.contains("verified = TRUE"));
        assert!(!query.contains("$3"));
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_maps_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        assert!(!is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
