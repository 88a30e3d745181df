//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) `require_account` has already authenticated the bearer credential.
//! 2) Read the account from the request extensions.
//! 3) Apply allow-listed updates.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::auth::{internal_error, normalize_name, AuthState};
use crate::store::{Account, AccountUpdate, Role};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub pending_email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Account> for MeResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            verified: account.verified,
            pending_email: account.pending_email.clone(),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MeUpdateRequest {
    pub name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Return the authenticated account profile.", body = MeResponse),
        (status = 401, description = "Missing or invalid credential."),
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn get_me(Extension(account): Extension<Account>) -> impl IntoResponse {
    (StatusCode::OK, Json(MeResponse::from(&account)))
}

#[utoipa::path(
    patch,
    path = "/v1/me",
    request_body = MeUpdateRequest,
    responses(
        (status = 200, description = "Profile updated.", body = MeResponse),
        (status = 400, description = "Invalid update payload."),
        (status = 401, description = "Missing or invalid credential."),
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn patch_me(
    auth_state: Extension<Arc<AuthState>>,
    Extension(mut account): Extension<Account>,
    Json(payload): Json<MeUpdateRequest>,
) -> impl IntoResponse {
    let Some(name) = payload.name.as_deref().and_then(normalize_name) else {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    };

    let update = AccountUpdate::Name(name);
    let now = Utc::now();
    match auth_state.store().update(account.id, &update, now).await {
        Ok(()) => {
            account.apply(&update, now);
            (StatusCode::OK, Json(MeResponse::from(&account))).into_response()
        }
        Err(err) => internal_error("Failed to update /me profile", &err).into_response(),
    }
}
