use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single-use secret unlocks.
///
/// All purposes share the same digest + expiry shape; they only differ in the
/// account slot (and SQL columns) they read and write, and in the frontend
/// page the emailed link points at.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Verification,
    Reset,
    EmailChange,
}

impl Purpose {
    pub const ALL: [Self; 3] = [Self::Verification, Self::Reset, Self::EmailChange];

    /// `(digest, expiry)` column pair backing this purpose.
    #[must_use]
    pub const fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Verification => (
                "verification_token_hash",
                "verification_token_expires_at",
            ),
            Self::Reset => ("reset_token_hash", "reset_token_expires_at"),
            Self::EmailChange => (
                "email_change_token_hash",
                "email_change_token_expires_at",
            ),
        }
    }

    /// Frontend route that consumes the secret.
    #[must_use]
    pub const fn link_path(self) -> &'static str {
        match self {
            Self::Verification => "verify-email",
            Self::Reset => "reset-password",
            Self::EmailChange => "confirm-email-change",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Reset => "reset",
            Self::EmailChange => "email_change",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
