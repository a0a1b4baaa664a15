//! Admin routes: booking oversight, spot blocks and account types.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use parkspot_core::{AccountType, BookingId, SpotNumber, UserId};

use super::{ApiJson, ApiPath};
use crate::db::{RepositoryError, StatusFilter, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Booking, User};
use crate::services::BookingService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBlockRequest {
    pub spot_number: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBlockResponse {
    pub message: &'static str,
    pub spot_number: SpotNumber,
    pub is_blocked: bool,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSpotsResponse {
    pub blocked_spots: Vec<SpotNumber>,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub account_type: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// List bookings, newest first.
///
/// GET /api/admin/bookings?status=active|cancelled|all
///
/// # Errors
///
/// Returns `400` for an unknown status filter.
#[instrument(skip_all)]
pub async fn list_bookings(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<BookingsResponse>> {
    let filter = match query.status.as_deref() {
        None | Some("") => StatusFilter::default(),
        Some(raw) => raw.parse().map_err(AppError::BadRequest)?,
    };
    let bookings = state.ledger().list_bookings(filter).await?;
    Ok(Json(BookingsResponse { bookings }))
}

/// Cancel an active booking.
///
/// DELETE /api/admin/bookings/{id}
///
/// # Errors
///
/// Returns `404` if the booking does not exist or is already cancelled.
#[instrument(skip_all)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<CancelResponse>> {
    let service = BookingService::new(state.ledger(), state.clock());
    let booking = service.cancel(id).await?;
    tracing::info!(admin_id = %admin.id, booking_id = %id, "Admin cancelled booking");
    Ok(Json(CancelResponse {
        message: "Booking cancelled successfully",
        booking,
    }))
}

/// Block an unblocked spot or unblock a blocked one.
///
/// POST /api/admin/spots/toggle-block
///
/// # Errors
///
/// Returns `400` if the spot number is outside `1..=16`.
#[instrument(skip_all)]
pub async fn toggle_block(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(req): ApiJson<ToggleBlockRequest>,
) -> Result<Json<ToggleBlockResponse>> {
    let spot =
        SpotNumber::new(req.spot_number).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let service = BookingService::new(state.ledger(), state.clock());
    let block = service.toggle_block(spot).await?;
    tracing::info!(admin_id = %admin.id, spot = %spot, is_blocked = block.is_blocked, "Admin toggled spot");

    Ok(Json(ToggleBlockResponse {
        message: "Spot status updated successfully",
        spot_number: block.spot_number,
        is_blocked: block.is_blocked,
        blocked_at: block.blocked_at,
    }))
}

/// Spots whose block flag is set, ascending.
///
/// GET /api/admin/blocked-spots
///
/// # Errors
///
/// Returns `500` if the store fails.
#[instrument(skip_all)]
pub async fn blocked_spots(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<BlockedSpotsResponse>> {
    let blocked_spots = state
        .ledger()
        .blocked_spots()
        .await?
        .into_iter()
        .map(|b| b.spot_number)
        .collect();
    Ok(Json(BlockedSpotsResponse { blocked_spots }))
}

/// List every account, ordered by ID.
///
/// GET /api/admin/users
///
/// # Errors
///
/// Returns `500` if the store fails.
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<UsersResponse>> {
    let users = UserRepository::new(state.pool()).list().await?;
    Ok(Json(UsersResponse { users }))
}

/// Check a role change before it reaches the store.
fn validate_role_change(
    caller: UserId,
    target: UserId,
    account_type: &str,
) -> Result<AccountType> {
    let account_type = account_type
        .parse::<AccountType>()
        .map_err(|_| AppError::BadRequest("Invalid account type".to_string()))?;
    if caller == target {
        return Err(AppError::Forbidden(
            "Cannot change your own account type".to_string(),
        ));
    }
    Ok(account_type)
}

/// Map a failed account-type update; an unknown user is a `404`.
fn role_update_error(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound("User not found".to_string()),
        other => AppError::Database(other),
    }
}

/// Change another user's account type.
///
/// PUT /api/admin/users/{id}/role
///
/// # Errors
///
/// Returns `400` for an account type other than `user` or `admin`, `403`
/// when targeting the caller's own account, and `404` for an unknown user.
#[instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>> {
    let account_type = validate_role_change(admin.id, id, &req.account_type)?;

    UserRepository::new(state.pool())
        .update_account_type(id, account_type)
        .await
        .map_err(role_update_error)?;

    tracing::info!(admin_id = %admin.id, user_id = %id, account_type = %account_type, "Account type changed");
    Ok(Json(MessageResponse {
        message: "User account type updated successfully",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;

    #[test]
    fn test_role_change_rejects_unknown_type() {
        let err = validate_role_change(UserId::new(1), UserId::new(2), "owner").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_role_change_rejects_self() {
        let err = validate_role_change(UserId::new(1), UserId::new(1), "user").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_role_update_unknown_user_is_not_found() {
        let response = role_update_error(RepositoryError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "User not found");
    }

    #[test]
    fn test_role_update_store_failure_is_internal() {
        let err = role_update_error(RepositoryError::DataCorruption("bad enum".to_string()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_role_change_allows_others() {
        assert_eq!(
            validate_role_change(UserId::new(1), UserId::new(2), "admin").unwrap(),
            AccountType::Admin
        );
    }
}
