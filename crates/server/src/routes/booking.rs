//! Driver-facing booking routes.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use parkspot_core::SpotNumber;

use super::ApiJson;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::Booking;
use crate::services::{BookingService, evaluate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub parking_spot: i64,
    pub car_number: String,
    pub hours: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedSpotsResponse {
    pub occupied_spots: Vec<SpotNumber>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotStatus {
    pub spot_number: SpotNumber,
    pub available: bool,
    pub blocked: bool,
    pub occupied_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SpotsResponse {
    pub spots: Vec<SpotStatus>,
}

/// Reserve a spot for the caller, starting now.
///
/// POST /api/booking
///
/// # Errors
///
/// Returns `400` for an invalid spot, car number or duration, and `409` if
/// the spot is blocked or occupied.
#[instrument(skip_all)]
pub async fn create_booking(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let service = BookingService::new(state.ledger(), state.clock());
    let booking = service
        .reserve(user.id, req.parking_spot, &req.car_number, req.hours)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Spots held by an active booking right now, ascending.
///
/// GET /api/bookings
///
/// # Errors
///
/// Returns `500` if the store fails.
#[instrument(skip_all)]
pub async fn occupied_spots(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
) -> Result<Json<OccupiedSpotsResponse>> {
    let now = state.clock().now();
    let occupied_spots = state
        .ledger()
        .snapshot_all(now)
        .await?
        .iter()
        .filter(|s| s.occupant(now).is_some())
        .map(|s| s.spot)
        .collect();
    Ok(Json(OccupiedSpotsResponse { occupied_spots }))
}

/// Availability of every spot right now.
///
/// GET /api/spots
///
/// # Errors
///
/// Returns `500` if the store fails.
#[instrument(skip_all)]
pub async fn spots(
    State(state): State<AppState>,
    RequireUser(_): RequireUser,
) -> Result<Json<SpotsResponse>> {
    let now = state.clock().now();
    let spots = state
        .ledger()
        .snapshot_all(now)
        .await?
        .iter()
        .map(|s| SpotStatus {
            spot_number: s.spot,
            available: evaluate(s, now).is_available(),
            blocked: s.is_blocked(),
            occupied_until: s.occupant(now).map(|b| b.ends_at),
        })
        .collect();
    Ok(Json(SpotsResponse { spots }))
}
