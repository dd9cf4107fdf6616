//! Booking incident reports and compensation flow.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::booking_report::{BookingReport, ReportStatus};

/// File a report against a booking. The reporter must be a participant
/// (driver or owner) of that booking.
pub async fn create_report(
    pool: &DbPool,
    reporter_id: Uuid,
    booking_id: Uuid,
    title: &str,
    description: &str,
    image_url: Option<String>,
) -> Result<BookingReport, AppError> {
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "title and description are required".to_string(),
        ));
    }

    let involved: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1 AND (driver_id = $2 OR owner_id = $2))",
    )
    .bind(booking_id)
    .bind(reporter_id)
    .fetch_one(pool)
    .await?;

    if !involved {
        return Err(AppError::NotFound("booking"));
    }

    let report = sqlx::query_as::<_, BookingReport>(
        r#"
        INSERT INTO booking_reports (booking_id, reporter_id, title, description, image_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(reporter_id)
    .bind(title)
    .bind(description)
    .bind(&image_url)
    .fetch_one(pool)
    .await?;

    Ok(report)
}

/// Staff takes a pending report under review.
pub async fn start_review(pool: &DbPool, report_id: Uuid) -> Result<BookingReport, AppError> {
    let mut tx = pool.begin().await?;
    let report = locked_report(&mut tx, report_id).await?;
    require_transition(&report, ReportStatus::UnderReview)?;

    let report = apply_status(&mut tx, report_id, report.status, ReportStatus::UnderReview).await?;
    tx.commit().await?;
    Ok(report)
}

/// Staff resolves a report under review, optionally imposing compensation.
///
/// A compensation determination needs all three of payer, amount and
/// deadline; the payer must be a participant of the reported booking. Once
/// resolved, the determination is terminal.
pub async fn resolve(
    pool: &DbPool,
    report_id: Uuid,
    payer_id: Option<Uuid>,
    amount_cents: Option<i64>,
    deadline: Option<DateTime<Utc>>,
) -> Result<BookingReport, AppError> {
    let mut tx = pool.begin().await?;
    let report = locked_report(&mut tx, report_id).await?;
    require_transition(&report, ReportStatus::Resolved)?;

    match (payer_id, amount_cents, deadline) {
        (None, None, None) => {
            let report =
                apply_status(&mut tx, report_id, report.status, ReportStatus::Resolved).await?;
            tx.commit().await?;
            Ok(report)
        }
        (Some(payer_id), Some(amount_cents), Some(deadline)) => {
            if amount_cents <= 0 {
                return Err(AppError::InvalidRequest(
                    "compensation amount must be positive".to_string(),
                ));
            }
            if deadline <= Utc::now() {
                return Err(AppError::InvalidRequest(
                    "compensation deadline must be in the future".to_string(),
                ));
            }

            let payer_involved: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1 AND (driver_id = $2 OR owner_id = $2))",
            )
            .bind(report.booking_id)
            .bind(payer_id)
            .fetch_one(&mut *tx)
            .await?;

            if !payer_involved {
                return Err(AppError::Conflict(
                    "compensation payer is not part of this booking".to_string(),
                ));
            }

            let report = sqlx::query_as::<_, BookingReport>(
                r#"
                UPDATE booking_reports
                SET status = 'resolved',
                    compensation_payer_id = $1,
                    compensation_amount_cents = $2,
                    compensation_deadline = $3,
                    updated_at = NOW()
                WHERE id = $4 AND status = 'under_review'
                RETURNING *
                "#,
            )
            .bind(payer_id)
            .bind(amount_cents)
            .bind(deadline)
            .bind(report_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Conflict("report changed state concurrently".to_string()))?;

            tx.commit().await?;
            Ok(report)
        }
        _ => Err(AppError::InvalidRequest(
            "compensation requires payer, amount and deadline together".to_string(),
        )),
    }
}

/// Staff rejects a report. Terminal.
pub async fn reject(pool: &DbPool, report_id: Uuid) -> Result<BookingReport, AppError> {
    let mut tx = pool.begin().await?;
    let report = locked_report(&mut tx, report_id).await?;
    require_transition(&report, ReportStatus::Rejected)?;

    let report = apply_status(&mut tx, report_id, report.status, ReportStatus::Rejected).await?;
    tx.commit().await?;
    Ok(report)
}

/// The compensation payer submits payment proof.
pub async fn pay_compensation(
    pool: &DbPool,
    payer_id: Uuid,
    report_id: Uuid,
    proof_url: String,
) -> Result<BookingReport, AppError> {
    let mut tx = pool.begin().await?;
    let report = locked_report(&mut tx, report_id).await?;

    if report.compensation_payer_id != Some(payer_id) {
        return Err(AppError::Forbidden("only the designated payer may pay"));
    }
    if report.status != ReportStatus::Resolved {
        return Err(AppError::Conflict("report is not resolved".to_string()));
    }
    if report.compensation_paid {
        return Err(AppError::Conflict(
            "compensation is already paid".to_string(),
        ));
    }

    let report = sqlx::query_as::<_, BookingReport>(
        r#"
        UPDATE booking_reports
        SET compensation_paid = TRUE, compensation_proof_url = $1, updated_at = NOW()
        WHERE id = $2 AND compensation_paid = FALSE
        RETURNING *
        "#,
    )
    .bind(&proof_url)
    .bind(report_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(report)
}

async fn locked_report(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
) -> Result<BookingReport, AppError> {
    sqlx::query_as::<_, BookingReport>("SELECT * FROM booking_reports WHERE id = $1 FOR UPDATE")
        .bind(report_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("report"))
}

fn require_transition(report: &BookingReport, next: ReportStatus) -> Result<(), AppError> {
    if !report.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "report cannot move from {:?} to {:?}",
            report.status, next
        )));
    }
    Ok(())
}

async fn apply_status(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
    expected: ReportStatus,
    next: ReportStatus,
) -> Result<BookingReport, AppError> {
    sqlx::query_as::<_, BookingReport>(
        "UPDATE booking_reports SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(next)
    .bind(report_id)
    .bind(expected)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::Conflict("report changed state concurrently".to_string()))
}
