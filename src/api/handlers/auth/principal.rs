//! Bearer-credential middleware for protected routes.
//!
//! Flow Overview:
//! 1) Read `Authorization: Bearer <credential>`.
//! 2) Run it through the credential guard (signature, expiry, account, verified,
//!    password-change cutoff).
//! 3) Attach the resolved [`Account`] to the request extensions so handlers can
//!    take `Extension<Account>`.

use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, field, Span};

use super::errors::{auth_error_response, internal_error};
use super::state::AuthState;
use super::types::CredentialResponse;
use crate::store::Account;

pub async fn require_account(
    Extension(auth_state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_state.guard().authenticate(request.headers()).await {
        Ok(account) => {
            Span::current().record("account_id", field::display(account.id));
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(err) => {
            debug!("Rejected bearer credential: {err}");
            auth_error_response(&err).into_response()
        }
    }
}

/// Sign a fresh credential for `account` and wrap it in the JSON body shared by
/// login, reset and password change.
pub(crate) fn credential_response(auth_state: &AuthState, account: &Account) -> Response {
    let signer = auth_state.guard().signer();
    match signer.issue(account.id, account.role) {
        Ok(token) => (
            StatusCode::OK,
            Json(CredentialResponse {
                token,
                token_type: "Bearer".to_string(),
                expires_in: signer.ttl_seconds(),
                user_id: account.id.to_string(),
                role: account.role,
            }),
        )
            .into_response(),
        Err(err) => internal_error("Failed to issue credential", &err).into_response(),
    }
}
