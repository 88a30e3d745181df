//! Role-restricted account lookup.
//!
//! Flow Overview:
//! 1) `require_account` has authenticated the bearer credential.
//! 2) Enforce the admin role.
//! 3) Return the public profile of the requested account.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::{auth_error_response, internal_error, AuthState};
use crate::credential::require_role;
use crate::store::{Account, AccountFilter, Role};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDetail {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub created_at: String,
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(
        ("id" = String, Path, description = "Account id (UUID)")
    ),
    responses(
        (status = 200, description = "Account profile.", body = UserDetail),
        (status = 400, description = "Invalid id."),
        (status = 401, description = "Missing or invalid credential."),
        (status = 403, description = "Forbidden."),
        (status = 404, description = "Not found."),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    auth_state: Extension<Arc<AuthState>>,
    Extension(caller): Extension<Account>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(err) = require_role(&caller, &[Role::Admin]) {
        return auth_error_response(&err).into_response();
    }

    let Ok(id) = Uuid::parse_str(&id) else {
        return (StatusCode::BAD_REQUEST, "Invalid id".to_string()).into_response();
    };

    match auth_state.store().find(&AccountFilter::Id(id)).await {
        Ok(Some(account)) => (
            StatusCode::OK,
            Json(UserDetail {
                id: account.id.to_string(),
                name: account.name,
                email: account.email,
                role: account.role,
                verified: account.verified,
                created_at: account.created_at.to_rfc3339(),
            }),
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => internal_error("Failed to fetch user", &err).into_response(),
    }
}
