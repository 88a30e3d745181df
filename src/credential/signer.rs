use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::{Claims, CredentialError};
use crate::store::Role;

pub const DEFAULT_CREDENTIAL_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Upper bound for a credential lifetime: one year.
pub const MAX_CREDENTIAL_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Minimum signing key length in bytes.
pub const MIN_KEY_BYTES: usize = 32;

/// HS256 signer/verifier for bearer credentials.
///
/// Built once at startup from the configured key and shared read-only.
#[derive(Clone)]
pub struct CredentialSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl CredentialSigner {
    /// # Errors
    /// Returns [`CredentialError::WeakKey`] if the key is shorter than [`MIN_KEY_BYTES`],
    /// [`CredentialError::InvalidTtl`] unless `1 <= ttl_seconds <= MAX_CREDENTIAL_TTL_SECONDS`.
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Result<Self, CredentialError> {
        let key = secret.expose_secret().as_bytes();
        if key.len() < MIN_KEY_BYTES {
            return Err(CredentialError::WeakKey);
        }
        if !(1..=MAX_CREDENTIAL_TTL_SECONDS).contains(&ttl_seconds) {
            return Err(CredentialError::InvalidTtl(ttl_seconds));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, CredentialError> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = Claims::new(user_id, role, issued_at, self.ttl_seconds);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| CredentialError::Signing)
    }

    /// Check signature, algorithm and expiry, returning the embedded claims.
    ///
    /// # Errors
    /// Returns [`CredentialError::Invalid`] for any malformed, forged or expired credential.
    pub fn verify(&self, credential: &str) -> Result<Claims, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        decode::<Claims>(credential, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| CredentialError::Invalid)
    }
}
