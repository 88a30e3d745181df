//! Email verification endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::{internal_error, token_error_response};
use super::state::AuthState;
use super::types::{ResendVerificationRequest, VerifyEmailRequest};
use super::utils::{normalize_email, valid_email};
use crate::api::email::EmailMessage;
use crate::store::{AccountFilter, AccountUpdate};
use crate::token::Purpose;

/// Verify the email link by consuming the secret and activating the account.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Invalid/expired token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let request: VerifyEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let account = match auth_state
        .issuer()
        .verify(Purpose::Verification, request.token.trim())
        .await
    {
        Ok(account) => account,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    // Mark verified and clear the secret in the same write.
    match auth_state
        .store()
        .update(account.id, &AccountUpdate::Verified, Utc::now())
        .await
    {
        Ok(()) => {
            info!(account_id = %account.id, "email verified");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => internal_error("Failed to verify email", &err).into_response(),
    }
}

/// Re-issue the verification email. The response does not reveal whether the
/// address exists or is already verified.
#[utoipa::path(
    post,
    path = "/v1/auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 204, description = "Resend accepted"),
        (status = 400, description = "Invalid input", body = String)
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> impl IntoResponse {
    let request: ResendVerificationRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let mut account = match auth_state.store().find(&AccountFilter::Email(email)).await {
        Ok(Some(account)) if !account.verified => account,
        Ok(_) => {
            debug!("resend-verification for unknown or verified address");
            return StatusCode::NO_CONTENT.into_response();
        }
        Err(err) => return internal_error("Failed to look up email", &err).into_response(),
    };

    let issued = match auth_state
        .issuer()
        .issue(&mut account, Purpose::Verification)
        .await
    {
        Ok(issued) => issued,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    let message = EmailMessage::new(
        &account.email,
        Purpose::Verification,
        auth_state.config().frontend_base_url(),
        &issued.secret,
    );
    if let Err(err) = auth_state.email().send(&message) {
        warn!(account_id = %account.id, "Failed to resend verification email: {err}");
    }

    StatusCode::NO_CONTENT.into_response()
}
