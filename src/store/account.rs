//! Account record and the role attached to it.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::token::Purpose;

/// Platform role embedded in bearer credentials.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Digest and expiry of a single-use secret. Both halves live and die together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSecret {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingSecret {
    /// A pending secret is usable only while its expiry is strictly in the future.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub credential_invalidated_at: Option<DateTime<Utc>>,
    pub verification: Option<PendingSecret>,
    pub reset: Option<PendingSecret>,
    pub email_change: Option<PendingSecret>,
    pub pending_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh, unverified account.
    #[must_use]
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role,
            verified: false,
            credential_invalidated_at: None,
            verification: None,
            reset: None,
            email_change: None,
            pending_email: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn pending(&self, purpose: Purpose) -> Option<&PendingSecret> {
        match purpose {
            Purpose::Verification => self.verification.as_ref(),
            Purpose::Reset => self.reset.as_ref(),
            Purpose::EmailChange => self.email_change.as_ref(),
        }
    }

    pub fn pending_mut(&mut self, purpose: Purpose) -> &mut Option<PendingSecret> {
        match purpose {
            Purpose::Verification => &mut self.verification,
            Purpose::Reset => &mut self.reset,
            Purpose::EmailChange => &mut self.email_change,
        }
    }

    /// Apply a field-scoped change to this in-memory copy, mirroring what
    /// [`AccountStore::update`](super::AccountStore::update) writes.
    pub fn apply(&mut self, update: &AccountUpdate, now: DateTime<Utc>) {
        match update {
            AccountUpdate::Name(name) => self.name.clone_from(name),
            AccountUpdate::Pending {
                purpose,
                secret,
                pending_email,
            } => {
                *self.pending_mut(*purpose) = secret.clone();
                if *purpose == Purpose::EmailChange {
                    self.pending_email.clone_from(pending_email);
                }
            }
            AccountUpdate::Verified => {
                self.verified = true;
                self.verification = None;
            }
            AccountUpdate::Password {
                password_hash,
                invalidated_at,
                consume_reset,
            } => {
                self.password_hash.clone_from(password_hash);
                self.credential_invalidated_at = Some(*invalidated_at);
                if *consume_reset {
                    self.reset = None;
                }
            }
            AccountUpdate::EmailChanged { email } => {
                self.email.clone_from(email);
                self.pending_email = None;
                self.email_change = None;
            }
        }
        self.updated_at = now;
    }
}

/// A write that touches only the columns it names.
///
/// Handlers hold a copy of the account read at the start of the request. That
/// copy is never written back whole; each transition goes through one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountUpdate {
    /// Display name.
    Name(String),
    /// Digest + expiry for `purpose`; `None` clears the pair. For
    /// [`Purpose::EmailChange`] the pending address is written alongside.
    Pending {
        purpose: Purpose,
        secret: Option<PendingSecret>,
        pending_email: Option<String>,
    },
    /// Mark the email verified and clear the verification secret.
    Verified,
    /// New hash plus invalidation cutoff; optionally clears the reset secret.
    Password {
        password_hash: String,
        invalidated_at: DateTime<Utc>,
        consume_reset: bool,
    },
    /// Swap in the confirmed address and clear the email-change state.
    EmailChanged { email: String },
}

impl AccountUpdate {
    /// Password change effective at `now`. The cutoff is stored at millisecond
    /// precision, matching the credential's `iatMs` claim, so every credential
    /// issued before `now` stops authenticating.
    #[must_use]
    pub fn password(password_hash: String, now: DateTime<Utc>, consume_reset: bool) -> Self {
        Self::Password {
            password_hash,
            invalidated_at: now.trunc_subsecs(3),
            consume_reset,
        }
    }
}
