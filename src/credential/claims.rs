use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Role;

/// Claims carried by the bearer credential.
///
/// `userId` and `role` use the field names the course and analytics services
/// already decode. `iat`/`exp` are whole seconds; `iatMs` keeps the issuance
/// instant precise enough to compare against a password change made in the
/// same second.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "iatMs")]
    pub issued_at_ms: i64,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, role: Role, issued_at: DateTime<Utc>, ttl_seconds: i64) -> Self {
        let iat = issued_at.timestamp();
        Self {
            user_id,
            role,
            iat,
            exp: iat.saturating_add(ttl_seconds),
            issued_at_ms: issued_at.timestamp_millis(),
        }
    }

    /// Issuance instant; falls back to `iat` if the millisecond claim is out of range.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.issued_at_ms)
            .or_else(|| DateTime::from_timestamp(self.iat, 0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn claims_use_platform_field_names() -> Result<()> {
        let issued_at = Utc::now();
        let claims = Claims::new(Uuid::new_v4(), Role::Instructor, issued_at, 60);
        let value = serde_json::to_value(&claims)?;

        let user_id = value
            .get("userId")
            .and_then(serde_json::Value::as_str)
            .context("missing userId")?;
        assert_eq!(user_id, claims.user_id.to_string());
        assert_eq!(
            value.get("role").and_then(serde_json::Value::as_str),
            Some("instructor")
        );
        assert_eq!(claims.exp - claims.iat, 60);
        Ok(())
    }

    #[test]
    fn issued_at_keeps_millisecond_precision() {
        let issued_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap_or_default();
        let claims = Claims::new(Uuid::nil(), Role::Student, issued_at, 60);
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.issued_at(), issued_at);
    }

    #[test]
    fn expiry_saturates_instead_of_overflowing() {
        let claims = Claims::new(Uuid::nil(), Role::Student, Utc::now(), i64::MAX);
        assert_eq!(claims.exp, i64::MAX);
    }
}
