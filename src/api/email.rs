//! Outbound email for single-use links.
//!
//! Handlers build an [`EmailMessage`] right after a secret is issued and hand
//! it to the configured [`EmailSender`]. The raw secret only exists inside the
//! message link, which is wrapped in a [`SecretString`] so it never reaches the
//! logs.
//!
//! The default sender for local dev is [`LogEmailSender`], which logs the
//! recipient and purpose and returns `Ok(())`.

use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::token::Purpose;

#[derive(Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub purpose: Purpose,
    pub link: SecretString,
}

impl EmailMessage {
    /// Link pointing at the frontend page that consumes `secret`.
    #[must_use]
    pub fn new(
        to_email: &str,
        purpose: Purpose,
        frontend_base_url: &str,
        secret: &SecretString,
    ) -> Self {
        Self {
            to_email: to_email.to_string(),
            purpose,
            link: build_link(frontend_base_url, purpose, secret),
        }
    }
}

/// Email delivery abstraction used by the auth handlers.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can roll back.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            purpose = %message.purpose,
            "email send stub"
        );
        Ok(())
    }
}

/// `{base}/{page}#token={secret}`; the fragment keeps the secret out of server access logs.
fn build_link(frontend_base_url: &str, purpose: Purpose, secret: &SecretString) -> SecretString {
    let base = frontend_base_url.trim_end_matches('/');
    SecretString::from(format!(
        "{base}/{}#token={}",
        purpose.link_path(),
        secret.expose_secret()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_targets_purpose_page() {
        let secret = SecretString::from("ab".repeat(32));
        let message = EmailMessage::new(
            "grace@example.com",
            Purpose::EmailChange,
            "https://learn.example.com/",
            &secret,
        );
        assert_eq!(
            message.link.expose_secret(),
            format!(
                "https://learn.example.com/confirm-email-change#token={}",
                "ab".repeat(32)
            )
        );
    }

    #[test]
    fn log_sender_never_fails() {
        let message = EmailMessage::new(
            "grace@example.com",
            Purpose::Verification,
            "https://learn.example.com",
            &SecretString::from("00".repeat(32)),
        );
        assert!(LogEmailSender.send(&message).is_ok());
    }

    #[test]
    fn debug_output_redacts_link() {
        let secret = "cd".repeat(32);
        let message = EmailMessage::new(
            "grace@example.com",
            Purpose::Reset,
            "https://learn.example.com",
            &SecretString::from(secret.clone()),
        );
        assert!(!format!("{message:?}").contains(&secret));
    }
}
