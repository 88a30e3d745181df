//! Password reset (unauthenticated) and password change (authenticated).
//!
//! Both paths store the new hash and move `credential_invalidated_at` forward
//! in the same write, so every credential issued before the change stops
//! working. The response carries a fresh credential.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use super::errors::{internal_error, token_error_response};
use super::principal::credential_response;
use super::state::AuthState;
use super::types::{CredentialResponse, ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{hash_password_blocking, normalize_email, valid_email, verify_password_blocking};
use crate::api::email::EmailMessage;
use crate::password::valid_password;
use crate::store::{Account, AccountFilter, AccountUpdate};
use crate::token::{Purpose, TokenError};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Email a reset link. Unknown addresses get the same response.
///
/// If the email cannot be sent the reset secret is revoked again, otherwise the
/// account would sit waiting for a link that never arrives.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Reset requested"),
        (status = 400, description = "Invalid input", body = String),
        (status = 500, description = "Reset email could not be sent", body = String)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let mut account = match auth_state.store().find(&AccountFilter::Email(email)).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            debug!("forgot-password for unknown address");
            return StatusCode::NO_CONTENT.into_response();
        }
        Err(err) => return internal_error("Failed to look up email", &err).into_response(),
    };

    let issued = match auth_state.issuer().issue(&mut account, Purpose::Reset).await {
        Ok(issued) => issued,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    let message = EmailMessage::new(
        &account.email,
        Purpose::Reset,
        auth_state.config().frontend_base_url(),
        &issued.secret,
    );
    if let Err(err) = auth_state.email().send(&message) {
        error!(account_id = %account.id, "Failed to send reset email: {err}");
        if let Err(revoke_err) = auth_state.issuer().revoke(&mut account, Purpose::Reset).await {
            error!(account_id = %account.id, "Failed to revoke reset secret: {revoke_err}");
        }
        let (status, message) = token_error_response(&TokenError::DeliveryFailure(Purpose::Reset));
        return (status, message).into_response();
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Set a new password using the emailed reset secret.
#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = CredentialResponse),
        (status = 400, description = "Invalid/expired token or invalid password", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_password(&request.password) {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    let mut account = match auth_state
        .issuer()
        .verify(Purpose::Reset, request.token.trim())
        .await
    {
        Ok(account) => account,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    let password_hash = match hash_password_blocking(request.password).await {
        Ok(hash) => hash,
        Err(err) => return internal_error("Failed to hash password", &err).into_response(),
    };

    let update = AccountUpdate::password(password_hash, Utc::now(), true);
    store_new_password(&auth_state, &mut account, &update, "password reset").await
}

/// Change the password of the authenticated account.
#[utoipa::path(
    post,
    path = "/v1/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = CredentialResponse),
        (status = 400, description = "Invalid password", body = String),
        (status = 401, description = "Missing/invalid credential or wrong current password", body = String)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn change_password(
    auth_state: Extension<Arc<AuthState>>,
    Extension(mut account): Extension<Account>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> impl IntoResponse {
    let request: ChangePasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_password(&request.new_password) {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    match verify_password_blocking(request.current_password, account.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                "current password is incorrect".to_string(),
            )
                .into_response();
        }
        Err(err) => return internal_error("Failed to verify password", &err).into_response(),
    }

    let password_hash = match hash_password_blocking(request.new_password).await {
        Ok(hash) => hash,
        Err(err) => return internal_error("Failed to hash password", &err).into_response(),
    };

    let update = AccountUpdate::password(password_hash, Utc::now(), false);
    store_new_password(&auth_state, &mut account, &update, "password change").await
}

async fn store_new_password(
    auth_state: &AuthState,
    account: &mut Account,
    update: &AccountUpdate,
    action: &str,
) -> axum::response::Response {
    let now = Utc::now();
    if let Err(err) = auth_state.store().update(account.id, update, now).await {
        return internal_error("Failed to store new password", &err).into_response();
    }
    account.apply(update, now);
    info!(account_id = %account.id, "{action} invalidated earlier credentials");
    credential_response(auth_state, account)
}
