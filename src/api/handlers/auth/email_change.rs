//! Email change: request from an authenticated session, confirm via the link
//! sent to the new address.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use super::errors::{internal_error, token_error_response};
use super::state::AuthState;
use super::types::ConfirmEmailChangeRequest;
use super::utils::{normalize_email, valid_email};
use crate::api::email::EmailMessage;
use crate::store::{Account, AccountFilter, AccountUpdate, StoreError};
use crate::token::{Purpose, TokenError};

const EMAIL_TAKEN: &str = "Email already registered";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EmailChangeRequest {
    pub new_email: String,
}

/// Start an email change. The new address is stored as pending and receives the
/// confirmation link; the current address stays active until confirmation.
#[utoipa::path(
    post,
    path = "/v1/me/email",
    request_body = EmailChangeRequest,
    responses(
        (status = 202, description = "Confirmation email sent to the new address"),
        (status = 400, description = "Invalid email", body = String),
        (status = 401, description = "Missing or invalid credential", body = String),
        (status = 409, description = "Email already registered", body = String),
        (status = 500, description = "Confirmation email could not be sent", body = String)
    ),
    security(("bearer" = [])),
    tag = "me"
)]
pub async fn request_email_change(
    auth_state: Extension<Arc<AuthState>>,
    Extension(mut account): Extension<Account>,
    payload: Option<Json<EmailChangeRequest>>,
) -> impl IntoResponse {
    let request: EmailChangeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let new_email = normalize_email(&request.new_email);
    if !valid_email(&new_email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if new_email == account.email {
        return (
            StatusCode::BAD_REQUEST,
            "New email matches the current one".to_string(),
        )
            .into_response();
    }

    match auth_state
        .store()
        .find(&AccountFilter::Email(new_email.clone()))
        .await
    {
        Ok(Some(_)) => return (StatusCode::CONFLICT, EMAIL_TAKEN.to_string()).into_response(),
        Ok(None) => {}
        Err(err) => return internal_error("Failed to look up email", &err).into_response(),
    }

    // Pending address and secret land in the same write.
    account.pending_email = Some(new_email.clone());
    let issued = match auth_state
        .issuer()
        .issue(&mut account, Purpose::EmailChange)
        .await
    {
        Ok(issued) => issued,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    let message = EmailMessage::new(
        &new_email,
        Purpose::EmailChange,
        auth_state.config().frontend_base_url(),
        &issued.secret,
    );
    if let Err(err) = auth_state.email().send(&message) {
        error!(account_id = %account.id, "Failed to send email-change confirmation: {err}");
        if let Err(revoke_err) = auth_state
            .issuer()
            .revoke(&mut account, Purpose::EmailChange)
            .await
        {
            error!(account_id = %account.id, "Failed to revoke email-change secret: {revoke_err}");
        }
        let (status, message) =
            token_error_response(&TokenError::DeliveryFailure(Purpose::EmailChange));
        return (status, message).into_response();
    }

    StatusCode::ACCEPTED.into_response()
}

/// Confirm an email change with the secret sent to the new address.
#[utoipa::path(
    post,
    path = "/v1/auth/confirm-email-change",
    request_body = ConfirmEmailChangeRequest,
    responses(
        (status = 204, description = "Email changed"),
        (status = 400, description = "Invalid/expired token", body = String),
        (status = 409, description = "Email already registered", body = String)
    ),
    tag = "auth"
)]
pub async fn confirm_email_change(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ConfirmEmailChangeRequest>>,
) -> impl IntoResponse {
    let request: ConfirmEmailChangeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let account = match auth_state
        .issuer()
        .verify(Purpose::EmailChange, request.token.trim())
        .await
    {
        Ok(account) => account,
        Err(err) => {
            let (status, message) = token_error_response(&err);
            return (status, message).into_response();
        }
    };

    let Some(new_email) = account.pending_email.clone() else {
        let (status, message) = token_error_response(&TokenError::NotFoundOrExpired);
        return (status, message).into_response();
    };

    let update = AccountUpdate::EmailChanged {
        email: new_email.clone(),
    };
    match auth_state
        .store()
        .update(account.id, &update, Utc::now())
        .await
    {
        Ok(()) => {
            info!(account_id = %account.id, previous = %account.email, email = %new_email, "email changed");
            StatusCode::NO_CONTENT.into_response()
        }
        // Someone registered the address between request and confirmation.
        Err(StoreError::Conflict) => (StatusCode::CONFLICT, EMAIL_TAKEN.to_string()).into_response(),
        Err(err) => internal_error("Failed to change email", &err).into_response(),
    }
}
