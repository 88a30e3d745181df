//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use tracing::error;

use crate::credential::AuthError;
use crate::token::TokenError;

/// Map token failures. Malformed, unknown, wrong, expired and consumed secrets
/// all produce the same response.
pub(crate) fn token_error_response(err: &TokenError) -> (StatusCode, String) {
    match err {
        TokenError::InvalidInput | TokenError::NotFoundOrExpired => (
            StatusCode::BAD_REQUEST,
            "invalid or expired token".to_string(),
        ),
        TokenError::DeliveryFailure(purpose) => {
            error!("Failed to deliver {purpose} email");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send email".to_string(),
            )
        }
        TokenError::Entropy
        | TokenError::InvalidTtl(_)
        | TokenError::ExpiryOutOfRange
        | TokenError::Store(_) => {
            error!("Token operation failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

pub(crate) fn auth_error_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        AuthError::Store(store_err) => {
            error!("Failed to resolve account for credential: {store_err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
        AuthError::NotAuthenticated
        | AuthError::InvalidCredential
        | AuthError::AccountGone
        | AuthError::MustVerify
        | AuthError::CredentialInvalidated => (StatusCode::UNAUTHORIZED, err.to_string()),
    }
}

pub(crate) fn internal_error(context: &str, err: &dyn std::fmt::Display) -> (StatusCode, String) {
    error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}
