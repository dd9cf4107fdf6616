//! Booking lifecycle operations driven by user actions.
//!
//! Time-driven transitions (expiry, reminder cascade, overdue handling)
//! live in [`crate::jobs::booking_jobs`]; this module covers the flows a
//! driver or owner triggers directly. Every status change is a conditional
//! UPDATE whose predicate re-states the expected current status, so a
//! concurrent job or request can never double-apply a transition.

use chrono::Utc;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus, CreateBookingRequest, platform_fee_cents};
use crate::models::car::CarStatus;

/// Create a booking request for a car.
///
/// # Validation
///
/// - start must precede end and lie in the future
/// - base price must be positive
/// - the car must exist, be active and be listed `available`
/// - owners cannot book their own car
pub async fn create_booking(
    pool: &DbPool,
    driver_id: Uuid,
    request: &CreateBookingRequest,
) -> Result<Booking, AppError> {
    if request.start_time >= request.end_time {
        return Err(AppError::InvalidRequest(
            "start time must be before end time".to_string(),
        ));
    }
    if request.start_time <= Utc::now() {
        return Err(AppError::InvalidRequest(
            "start time must be in the future".to_string(),
        ));
    }
    if request.base_price_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "base price must be positive".to_string(),
        ));
    }

    let car: Option<(Uuid, CarStatus)> = sqlx::query_as(
        "SELECT owner_id, status FROM cars WHERE id = $1 AND lifecycle = 'active'",
    )
    .bind(request.car_id)
    .fetch_optional(pool)
    .await?;

    let (owner_id, car_status) = car.ok_or(AppError::NotFound("car"))?;
    if car_status != CarStatus::Available {
        return Err(AppError::Conflict("car is not available".to_string()));
    }
    if owner_id == driver_id {
        return Err(AppError::Conflict(
            "owners cannot book their own car".to_string(),
        ));
    }

    let platform_fee = platform_fee_cents(request.base_price_cents);
    let total = request.base_price_cents + platform_fee;

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (
            car_id, driver_id, owner_id, start_time, end_time,
            base_price_cents, platform_fee_cents, excess_day_fee_cents, total_amount_cents
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8)
        RETURNING *
        "#,
    )
    .bind(request.car_id)
    .bind(driver_id)
    .bind(owner_id)
    .bind(request.start_time)
    .bind(request.end_time)
    .bind(request.base_price_cents)
    .bind(platform_fee)
    .bind(total)
    .fetch_one(pool)
    .await?;

    Ok(booking)
}

/// Owner approves a pending booking.
pub async fn approve(pool: &DbPool, owner_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.owner_id != owner_id {
        return Err(AppError::Forbidden("only the car owner may approve"));
    }
    require_transition(&booking, BookingStatus::Approved)?;

    let booking = apply_status(&mut tx, booking_id, booking.status, BookingStatus::Approved).await?;
    tx.commit().await?;
    Ok(booking)
}

/// Owner rejects a pending booking. Refunds the driver if already paid.
pub async fn reject(pool: &DbPool, owner_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.owner_id != owner_id {
        return Err(AppError::Forbidden("only the car owner may reject"));
    }
    require_transition(&booking, BookingStatus::Rejected)?;

    let booking = apply_status(&mut tx, booking_id, booking.status, BookingStatus::Rejected).await?;
    refund_if_paid(&mut tx, &booking, "Refunded after owner rejection").await?;
    tx.commit().await?;
    Ok(booking)
}

/// Driver cancels their own booking while it is still pending or approved.
/// Refunds in full if paid.
pub async fn cancel(pool: &DbPool, driver_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.driver_id != driver_id {
        return Err(AppError::Forbidden("only the booking driver may cancel"));
    }
    require_transition(&booking, BookingStatus::Cancelled)?;

    let booking = apply_status(&mut tx, booking_id, booking.status, BookingStatus::Cancelled).await?;
    refund_if_paid(&mut tx, &booking, "Refunded after driver cancellation").await?;
    tx.commit().await?;
    Ok(booking)
}

/// Record a completed payment for a booking and lock the owner's share in
/// escrow. The gateway protocol itself lives outside this core; this is
/// the state effect of a verified payment.
pub async fn mark_paid(pool: &DbPool, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.is_paid {
        return Err(AppError::Conflict("booking is already paid".to_string()));
    }
    if booking.status.is_terminal() {
        return Err(AppError::Conflict(
            "booking is no longer payable".to_string(),
        ));
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET is_paid = TRUE, owner_locked_amount_cents = base_price_cents, updated_at = NOW()
        WHERE id = $1 AND is_paid = FALSE
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(booking)
}

/// Owner marks an approved, paid booking ready for pickup.
pub async fn mark_ready(pool: &DbPool, owner_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.owner_id != owner_id {
        return Err(AppError::Forbidden("only the car owner may mark ready"));
    }
    if !booking.is_paid {
        return Err(AppError::Conflict("booking has not been paid".to_string()));
    }
    require_transition(&booking, BookingStatus::ReadyForPickup)?;

    let booking =
        apply_status(&mut tx, booking_id, booking.status, BookingStatus::ReadyForPickup).await?;
    tx.commit().await?;
    Ok(booking)
}

/// Driver picks the car up; the rental becomes ongoing and a contract is
/// issued pinning the car's current GPS device.
pub async fn start_rental(
    pool: &DbPool,
    driver_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.driver_id != driver_id {
        return Err(AppError::Forbidden("only the booking driver may pick up"));
    }
    require_transition(&booking, BookingStatus::Ongoing)?;

    let booking = apply_status(&mut tx, booking_id, booking.status, BookingStatus::Ongoing).await?;

    let device_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT device_id FROM car_gps WHERE car_id = $1 AND lifecycle = 'active'",
    )
    .bind(booking.car_id)
    .fetch_optional(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO contracts (booking_id, car_id, gps_device_id) VALUES ($1, $2, $3)",
    )
    .bind(booking.id)
    .bind(booking.car_id)
    .bind(device_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE cars SET status = 'rented', updated_at = NOW() WHERE id = $1")
        .bind(booking.car_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(booking)
}

/// Driver hands the car back. This only flips the returned flag; the owner
/// confirms completion separately.
pub async fn return_car(
    pool: &DbPool,
    driver_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.driver_id != driver_id {
        return Err(AppError::Forbidden("only the booking driver may return"));
    }
    if booking.status != BookingStatus::Ongoing {
        return Err(AppError::Conflict("booking is not ongoing".to_string()));
    }
    if booking.is_car_returned {
        return Err(AppError::Conflict("car is already returned".to_string()));
    }

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings SET is_car_returned = TRUE, updated_at = NOW()
        WHERE id = $1 AND status = 'ongoing'
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(booking)
}

/// Owner confirms the returned car and completes the rental. The car goes
/// back on the listing; escrow release is handled by the balance job.
pub async fn complete(pool: &DbPool, owner_id: Uuid, booking_id: Uuid) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;
    let booking = locked_booking(&mut tx, booking_id).await?;

    if booking.owner_id != owner_id {
        return Err(AppError::Forbidden("only the car owner may complete"));
    }
    if !booking.is_car_returned {
        return Err(AppError::Conflict("car has not been returned".to_string()));
    }
    require_transition(&booking, BookingStatus::Completed)?;

    let booking =
        apply_status(&mut tx, booking_id, booking.status, BookingStatus::Completed).await?;

    sqlx::query("UPDATE cars SET status = 'available', updated_at = NOW() WHERE id = $1")
        .bind(booking.car_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(booking)
}

/// Fetch one booking visible to the given participant.
pub async fn get_booking(
    pool: &DbPool,
    actor_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    let booking = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE id = $1 AND (driver_id = $2 OR owner_id = $2)",
    )
    .bind(booking_id)
    .bind(actor_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("booking"))?;

    Ok(booking)
}

/// List bookings the user participates in, newest first.
pub async fn list_bookings(pool: &DbPool, actor_id: Uuid) -> Result<Vec<Booking>, AppError> {
    let bookings = sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE driver_id = $1 OR owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(actor_id)
    .fetch_all(pool)
    .await?;

    Ok(bookings)
}

/// Load a booking with a row lock for the rest of the transaction.
async fn locked_booking(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("booking"))
}

fn require_transition(booking: &Booking, next: BookingStatus) -> Result<(), AppError> {
    if !booking.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "booking cannot move from {:?} to {:?}",
            booking.status, next
        )));
    }
    Ok(())
}

/// Conditional status flip; the WHERE clause re-checks the expected status
/// so a concurrent transition loses cleanly instead of overwriting.
async fn apply_status(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    expected: BookingStatus,
    next: BookingStatus,
) -> Result<Booking, AppError> {
    sqlx::query_as::<_, Booking>(
        "UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(next)
    .bind(booking_id)
    .bind(expected)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::Conflict("booking changed state concurrently".to_string()))
}

/// Credit the driver's balance with the full amount of a paid, not yet
/// refunded booking; zero the owner's escrow lock; append a note. No-op
/// for unpaid or already refunded bookings.
async fn refund_if_paid(
    tx: &mut Transaction<'_, Postgres>,
    booking: &Booking,
    note: &str,
) -> Result<(), AppError> {
    if !booking.is_paid || booking.is_refund {
        return Ok(());
    }

    let flipped = sqlx::query(
        r#"
        UPDATE bookings
        SET is_refund = TRUE, owner_locked_amount_cents = 0,
            note = COALESCE(note || E'\n', '') || $2, updated_at = NOW()
        WHERE id = $1 AND is_refund = FALSE
        "#,
    )
    .bind(booking.id)
    .bind(note)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    // The refund flag guards the balance credit against double application
    if flipped > 0 {
        sqlx::query(
            "UPDATE users SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(booking.total_amount_cents)
        .bind(booking.driver_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
