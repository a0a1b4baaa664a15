//! Registration and login.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiJson;
use crate::error::Result;
use crate::models::User;
use crate::services::AuthService;
use crate::services::auth::Session;
use crate::state::AppState;

/// Email + password request body.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Token issued after register or login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            user: session.user,
        }
    }
}

/// Register a new account.
///
/// POST /api/register
///
/// # Errors
///
/// Returns `400` for a malformed email or short password, `409` if the
/// email is taken.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let auth = AuthService::new(state.pool(), state.token_keys(), state.clock());
    let session = auth.register(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Log in with email and password.
///
/// POST /api/login
///
/// # Errors
///
/// Returns `401` if the email is unknown or the password is wrong.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<SessionResponse>> {
    let auth = AuthService::new(state.pool(), state.token_keys(), state.clock());
    let session = auth.login(&req.email, &req.password).await?;
    tracing::info!(user_id = %session.user.id, "User logged in");
    Ok(Json(session.into()))
}
