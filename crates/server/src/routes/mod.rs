//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /api/register                 - Create a user account, returns token
//! POST   /api/login                    - Exchange credentials for a token
//!
//! # Bookings (bearer token)
//! POST   /api/booking                  - Reserve a spot starting now
//! GET    /api/bookings                 - Spots currently held by a booking
//! GET    /api/spots                    - Per-spot availability
//!
//! # Admin (bearer token, admin account)
//! GET    /api/admin/bookings           - List bookings (?status=active|cancelled|all)
//! DELETE /api/admin/bookings/{id}      - Cancel an active booking
//! POST   /api/admin/spots/toggle-block - Block or unblock a spot
//! GET    /api/admin/blocked-spots      - Currently blocked spots
//! GET    /api/admin/users              - List accounts
//! PUT    /api/admin/users/{id}/role    - Change another user's account type
//! ```

pub mod admin;
pub mod auth;
pub mod booking;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post, put},
};

use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// JSON body extractor that rejects with a JSON `400` instead of axum's
/// plain-text rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor that rejects with a JSON `400`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Create the `/api` router.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/api", api_routes())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .route("/booking", post(booking::create_booking))
        .route("/bookings", get(booking::occupied_spots))
        .route("/spots", get(booking::spots))
        .nest("/admin", admin_routes())
}

/// Create the credential routes, rate limited per client IP.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
}

/// Create the admin routes router.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(admin::list_bookings))
        .route("/bookings/{id}", delete(admin::cancel_booking))
        .route("/spots/toggle-block", post(admin::toggle_block))
        .route("/blocked-spots", get(admin::blocked_spots))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::update_role))
}
