//! Password login.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::internal_error;
use super::principal::credential_response;
use super::state::AuthState;
use super::types::{CredentialResponse, LoginRequest};
use super::utils::{normalize_email, verify_password_blocking};
use crate::store::AccountFilter;

const INVALID_LOGIN: &str = "invalid email or password";

/// Exchange email + password for a bearer credential.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = CredentialResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Invalid email or password", body = String),
        (status = 403, description = "Account not verified", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let account = match auth_state.store().find(&AccountFilter::Email(email)).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            debug!("login for unknown address");
            return (StatusCode::UNAUTHORIZED, INVALID_LOGIN.to_string()).into_response();
        }
        Err(err) => return internal_error("Failed to look up email", &err).into_response(),
    };

    match verify_password_blocking(request.password, account.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(account_id = %account.id, "login password mismatch");
            return (StatusCode::UNAUTHORIZED, INVALID_LOGIN.to_string()).into_response();
        }
        Err(err) => return internal_error("Failed to verify password", &err).into_response(),
    }

    if !account.verified {
        return (StatusCode::FORBIDDEN, "must verify account".to_string()).into_response();
    }

    info!(account_id = %account.id, "login succeeded");
    credential_response(&auth_state, &account)
}
