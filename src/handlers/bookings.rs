//! Booking lifecycle HTTP handlers.
//!
//! - POST /api/v1/bookings - Driver requests a rental
//! - GET /api/v1/bookings - List bookings the caller participates in
//! - GET /api/v1/bookings/:id - Fetch one booking
//! - POST /api/v1/bookings/:id/approve - Owner accepts the request
//! - POST /api/v1/bookings/:id/reject - Owner declines the request
//! - POST /api/v1/bookings/:id/cancel - Driver withdraws
//! - POST /api/v1/bookings/:id/pay - Record payment in escrow
//! - POST /api/v1/bookings/:id/ready - Owner stages the car for pickup
//! - POST /api/v1/bookings/:id/pickup - Driver takes the car (contract snapshot)
//! - POST /api/v1/bookings/:id/return - Driver hands the car back
//! - POST /api/v1/bookings/:id/complete - Owner confirms return

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    jobs::booking_jobs,
    middleware::auth::AuthContext,
    models::booking::{BookingResponse, CreateBookingRequest},
    services::booking_service,
    state::AppState,
};

/// Create a booking request and arm its owner-reminder timers.
///
/// An unanswered request is nudged at 24h and 48h, warned at 60h, and
/// auto-expired at 72h.
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::create_booking(&state.pool, auth.user_id, &request).await?;

    booking_jobs::schedule_reminders(
        &state.scheduler,
        state.pool.clone(),
        state.mailer.clone(),
        booking.id,
    );

    tracing::info!(booking_id = %booking.id, driver_id = %auth.user_id, "booking created");

    Ok(Json(booking.into()))
}

/// List bookings where the caller is the driver or the car owner.
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = booking_service::list_bookings(&state.pool, auth.user_id).await?;

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// Fetch a single booking the caller participates in.
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::get_booking(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Owner approves a pending request.
pub async fn approve_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::approve(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Owner rejects a pending request; any escrowed payment is refunded.
pub async fn reject_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::reject(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Driver cancels before pickup; any escrowed payment is refunded.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::cancel(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Record that the driver has paid the total into escrow.
pub async fn pay_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::get_booking(&state.pool, auth.user_id, booking_id).await?;
    if booking.driver_id != auth.user_id {
        return Err(AppError::Forbidden("only the booking driver may pay"));
    }

    let booking = booking_service::mark_paid(&state.pool, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Owner stages a paid, approved booking for pickup.
pub async fn mark_ready(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::mark_ready(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Driver picks the car up; the rental goes ongoing and a contract row
/// snapshots the car's active GPS device.
pub async fn start_rental(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::start_rental(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Driver reports the car returned.
pub async fn return_car(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::return_car(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}

/// Owner confirms the return; the booking completes and the car goes back
/// on the market. Escrow release to the owner happens asynchronously.
pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = booking_service::complete(&state.pool, auth.user_id, booking_id).await?;

    Ok(Json(booking.into()))
}
