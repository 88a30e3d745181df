//! Raw secret generation, digesting and shape checks.

use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use sha2::{Digest, Sha256};

use super::TokenError;

/// Random bytes behind every secret (256 bits).
pub const SECRET_BYTES: usize = 32;

/// Hex length of both the raw secret and its digest.
pub const SECRET_HEX_LEN: usize = SECRET_BYTES * 2;

/// Create a new raw secret for an emailed link.
///
/// The returned value is only handed to the notifier; storage keeps the digest.
pub fn generate_secret() -> Result<SecretString, TokenError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| TokenError::Entropy)?;
    Ok(SecretString::from(hex::encode(bytes)))
}

/// SHA-256 of the secret, lowercase hex.
#[must_use]
pub fn digest_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Presented secrets must be exactly 64 lowercase hex characters.
#[must_use]
pub fn is_well_formed(secret: &str) -> bool {
    secret.len() == SECRET_HEX_LEN
        && secret
            .bytes()
            .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn generated_secret_is_well_formed() -> anyhow::Result<()> {
        let secret = generate_secret()?;
        assert_eq!(secret.expose_secret().len(), SECRET_HEX_LEN);
        assert!(is_well_formed(secret.expose_secret()));
        Ok(())
    }

    #[test]
    fn generated_secrets_differ() -> anyhow::Result<()> {
        let first = generate_secret()?;
        let second = generate_secret()?;
        assert_ne!(first.expose_secret(), second.expose_secret());
        Ok(())
    }

    #[test]
    fn digest_is_stable_and_fixed_length() {
        let first = digest_secret("token");
        let second = digest_secret("token");
        let different = digest_secret("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), SECRET_HEX_LEN);
        assert!(is_well_formed(&first));
    }

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            digest_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn shape_check_rejects_bad_input() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed(&"a".repeat(63)));
        assert!(!is_well_formed(&"a".repeat(65)));
        assert!(!is_well_formed(&"g".repeat(64)));
        assert!(!is_well_formed(&"A".repeat(64)));
        assert!(!is_well_formed(&format!("{} ", "a".repeat(63))));
        assert!(is_well_formed(&"0123456789abcdef".repeat(4)));
    }
}
