//! Account registration.
//!
//! Flow Overview:
//! 1) Validate name, email, password and requested role.
//! 2) Hash the password and build an unverified account.
//! 3) Insert the account with its verification secret already in place.
//! 4) Email the verification link. A failed send is logged and the caller can
//!    use resend-verification.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{info, warn};

use super::errors::{internal_error, token_error_response};
use super::state::AuthState;
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{hash_password_blocking, normalize_email, normalize_name, valid_email};
use crate::api::email::EmailMessage;
use crate::password::valid_password;
use crate::store::{Account, AccountFilter, Role, StoreError};
use crate::token::{Purpose, TokenError};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email sent", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Some(name) = normalize_name(&request.name) else {
        return (StatusCode::BAD_REQUEST, "Invalid name".to_string()).into_response();
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if !valid_password(&request.password) {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }

    let role = request.role.unwrap_or_default();
    if role == Role::Admin {
        return (
            StatusCode::BAD_REQUEST,
            "Admin accounts cannot self-register".to_string(),
        )
            .into_response();
    }

    match auth_state.store().find(&AccountFilter::Email(email.clone())).await {
        Ok(Some(_)) => {
            return (StatusCode::CONFLICT, "Email already registered".to_string()).into_response();
        }
        Ok(None) => {}
        Err(err) => return internal_error("Failed to look up email", &err).into_response(),
    }

    let password_hash = match hash_password_blocking(request.password).await {
        Ok(hash) => hash,
        Err(err) => return internal_error("Failed to hash password", &err).into_response(),
    };

    let mut account = Account::new(name, email, password_hash, role);
    let issued = match auth_state
        .issuer()
        .issue_with_insert(&mut account, Purpose::Verification)
        .await
    {
        Ok(issued) => issued,
        // Lost a race with a concurrent registration for the same address.
        Err(TokenError::Store(StoreError::Conflict)) => {
            return (StatusCode::CONFLICT, "Email already registered".to_string()).into_response();
        }
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    info!(account_id = %account.id, role = %account.role, "registered account");

    let message = EmailMessage::new(
        &account.email,
        Purpose::Verification,
        auth_state.config().frontend_base_url(),
        &issued.secret,
    );
    if let Err(err) = auth_state.email().send(&message) {
        warn!(account_id = %account.id, "Failed to send verification email: {err}");
    }

    (
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: account.id.to_string(),
            email: account.email,
            verified: account.verified,
        }),
    )
        .into_response()
}
