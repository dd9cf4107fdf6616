//! Time-driven booking state transitions.
//!
//! Every job here is written to be safe under repeated and concurrent
//! invocation: transitions are set-based conditional UPDATEs (the predicate
//! excludes rows already handled) and balance credits are gated on flags
//! flipped in the same transaction. "Booking not found / not in the
//! expected state" is always a no-op, never an error; persistence failures
//! propagate to the scheduler loop.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::jobs::scheduler::JobScheduler;
use crate::models::booking::BookingStatus;
use crate::services::email_service::Mailer;

/// Pending bookings expire this long after their start time.
pub const PENDING_EXPIRY_DAYS: i64 = 30;

/// Approved bookings expire this long after their start time.
pub const APPROVED_EXPIRY_DAYS: i64 = 1;

/// An approved booking starting within this window after an overdue
/// booking's end time gets cancelled by the overdue cascade.
pub const BUMP_WINDOW_HOURS: i64 = 6;

/// Compensation quoted to a bumped renter, percent of their total.
pub const BUMP_COMPENSATION_PERCENT: i64 = 30;

/// Cancellation is free until this many days before start; the owner's
/// escrow stays locked until the window passes.
pub const PRE_START_CANCEL_DAYS: i64 = 3;

/// Expire stale bookings in one set-based statement.
///
/// Pending bookings whose start time is more than 30 days old and approved
/// bookings whose start time is more than 1 day old become `expired`.
/// Running this twice changes nothing the second time: the predicate only
/// matches rows still in a pre-expiry status.
pub async fn expire_stale_bookings(pool: &DbPool) -> Result<u64, AppError> {
    let affected = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'expired', updated_at = NOW()
        WHERE (status = 'pending' AND start_time < NOW() - INTERVAL '30 days')
           OR (status = 'approved' AND start_time < NOW() - INTERVAL '1 day')
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(affected)
}

/// Reminder cascade steps for a pending booking, offset from creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStep {
    Reminder24h,
    Reminder48h,
    Reminder60h,
    Expire72h,
}

impl ReminderStep {
    pub const ALL: [ReminderStep; 4] = [
        ReminderStep::Reminder24h,
        ReminderStep::Reminder48h,
        ReminderStep::Reminder60h,
        ReminderStep::Expire72h,
    ];

    /// Delay after booking creation at which this step fires.
    pub fn offset(self) -> std::time::Duration {
        let hours = match self {
            ReminderStep::Reminder24h => 24,
            ReminderStep::Reminder48h => 48,
            ReminderStep::Reminder60h => 60,
            ReminderStep::Expire72h => 72,
        };
        std::time::Duration::from_secs(hours * 3600)
    }
}

/// Schedule the full reminder cascade for a freshly created booking.
///
/// Each step re-checks the booking is still pending when it fires, so
/// scheduling is unconditional here.
pub fn schedule_reminders(
    scheduler: &JobScheduler,
    pool: DbPool,
    mailer: Mailer,
    booking_id: Uuid,
) {
    for step in ReminderStep::ALL {
        let pool = pool.clone();
        let mailer = mailer.clone();
        scheduler.schedule_in(step.offset(), async move {
            if let Err(e) = run_reminder_step(&pool, &mailer, booking_id, step).await {
                tracing::error!(%booking_id, ?step, error = %e, "reminder step failed");
            }
        });
    }
}

/// Run one reminder cascade step.
///
/// No-op if the booking has left `pending` in the meantime. The 72h step
/// expires the booking and, if it had been paid, refunds 100% of the total
/// to the driver's balance exactly once.
pub async fn run_reminder_step(
    pool: &DbPool,
    mailer: &Mailer,
    booking_id: Uuid,
    step: ReminderStep,
) -> Result<(), AppError> {
    if step == ReminderStep::Expire72h {
        return expire_unanswered_booking(pool, mailer, booking_id).await;
    }

    // Owner contact, only while the booking is still awaiting their answer
    let owner: Option<(String, String)> = sqlx::query_as(
        r#"
        SELECT u.email, u.name
        FROM bookings b
        JOIN users u ON u.id = b.owner_id
        WHERE b.id = $1 AND b.status = 'pending'
        "#,
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;

    let Some((email, name)) = owner else {
        return Ok(());
    };

    mailer
        .send(
            &email,
            "A booking request is waiting for you",
            &format!(
                "<p>Hi {name},</p>\
                 <p>A booking request for your car is still waiting for an answer. \
                 It will expire automatically 72 hours after it was made.</p>"
            ),
        )
        .await;

    Ok(())
}

/// 72h step: expire the still-pending booking and refund the driver.
async fn expire_unanswered_booking(
    pool: &DbPool,
    mailer: &Mailer,
    booking_id: Uuid,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    // Only a still-pending booking matches; a second run is a no-op
    let expired: Option<(Uuid, bool, bool, i64)> = sqlx::query_as(
        r#"
        UPDATE bookings
        SET status = 'expired', owner_locked_amount_cents = 0,
            note = COALESCE(note || E'\n', '') || 'Expired 72 hours after creation with no owner response',
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING driver_id, is_paid, is_refund, total_amount_cents
        "#,
    )
    .bind(booking_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((driver_id, is_paid, is_refund, total_amount_cents)) = expired else {
        return Ok(());
    };

    if is_paid && !is_refund {
        sqlx::query("UPDATE bookings SET is_refund = TRUE WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE users SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(total_amount_cents)
        .bind(driver_id)
        .execute(&mut *tx)
        .await?;
    }

    let driver: Option<(String, String)> =
        sqlx::query_as("SELECT email, name FROM users WHERE id = $1")
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?;

    tx.commit().await?;

    if let Some((email, name)) = driver {
        let refund_line = if is_paid {
            "<p>Your payment has been refunded in full to your balance.</p>"
        } else {
            ""
        };
        mailer
            .send(
                &email,
                "Your booking request expired",
                &format!(
                    "<p>Hi {name},</p>\
                     <p>The owner did not respond to your booking request within 72 hours, \
                     so it has expired.</p>{refund_line}"
                ),
            )
            .await;
    }

    Ok(())
}

/// Whether an approved booking starting at `candidate_start` is bumped by
/// an overdue booking ending at `overdue_end`.
pub fn within_bump_window(
    overdue_end: DateTime<Utc>,
    candidate_start: DateTime<Utc>,
) -> bool {
    candidate_start >= overdue_end
        && candidate_start < overdue_end + Duration::hours(BUMP_WINDOW_HOURS)
}

/// Compensation quoted to a bumped renter.
pub fn compensation_cents(total_amount_cents: i64) -> i64 {
    total_amount_cents * BUMP_COMPENSATION_PERCENT / 100
}

/// Overdue-booking cascade.
///
/// For every ongoing booking past its end time with the car still out,
/// cancel the next approved booking on the same car starting within the
/// 6-hour bump window, refund it in full if paid, and notify both renters.
/// Idempotent: a second run finds the bumped booking no longer approved.
pub async fn cancel_bumped_bookings(pool: &DbPool, mailer: &Mailer) -> Result<u64, AppError> {
    let overdue: Vec<(Uuid, Uuid, DateTime<Utc>, Uuid)> = sqlx::query_as(
        r#"
        SELECT id, car_id, end_time, driver_id
        FROM bookings
        WHERE status = 'ongoing' AND end_time < NOW() AND is_car_returned = FALSE
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut cancelled = 0u64;

    for (overdue_id, car_id, end_time, overdue_driver_id) in overdue {
        let bumped: Option<(Uuid, Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT id, driver_id, total_amount_cents
            FROM bookings
            WHERE car_id = $1
              AND status = 'approved'
              AND start_time >= $2
              AND start_time < $2 + INTERVAL '6 hours'
            ORDER BY start_time
            LIMIT 1
            "#,
        )
        .bind(car_id)
        .bind(end_time)
        .fetch_optional(pool)
        .await?;

        let Some((bumped_id, bumped_driver_id, bumped_total)) = bumped else {
            continue;
        };

        let mut tx = pool.begin().await?;

        let row: Option<(bool, bool)> = sqlx::query_as(
            r#"
            UPDATE bookings
            SET status = 'cancelled', owner_locked_amount_cents = 0,
                note = COALESCE(note || E'\n', '') || 'Cancelled because the previous rental was not returned in time',
                updated_at = NOW()
            WHERE id = $1 AND status = 'approved'
            RETURNING is_paid, is_refund
            "#,
        )
        .bind(bumped_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Already handled by an earlier run
        let Some((is_paid, is_refund)) = row else {
            continue;
        };

        if is_paid && !is_refund {
            sqlx::query("UPDATE bookings SET is_refund = TRUE WHERE id = $1")
                .bind(bumped_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "UPDATE users SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(bumped_total)
            .bind(bumped_driver_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        cancelled += 1;

        notify_overdue_parties(
            pool,
            mailer,
            overdue_id,
            overdue_driver_id,
            bumped_driver_id,
            compensation_cents(bumped_total),
        )
        .await;
    }

    Ok(cancelled)
}

/// Distinct mail templates for the overdue renter and the bumped renter.
async fn notify_overdue_parties(
    pool: &DbPool,
    mailer: &Mailer,
    overdue_booking_id: Uuid,
    overdue_driver_id: Uuid,
    bumped_driver_id: Uuid,
    compensation: i64,
) {
    let contacts: Result<Vec<(Uuid, String, String)>, sqlx::Error> =
        sqlx::query_as("SELECT id, email, name FROM users WHERE id = ANY($1)")
            .bind(vec![overdue_driver_id, bumped_driver_id])
            .fetch_all(pool)
            .await;

    let contacts = match contacts {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(%overdue_booking_id, error = %e, "failed to load contacts for overdue notifications");
            return;
        }
    };

    for (id, email, name) in contacts {
        if id == overdue_driver_id {
            mailer
                .send(
                    &email,
                    "Your rental is overdue",
                    &format!(
                        "<p>Hi {name},</p>\
                         <p>Your rental has passed its end time and the car has not been returned. \
                         Please return it immediately; the next renter's booking had to be cancelled.</p>"
                    ),
                )
                .await;
        } else {
            mailer
                .send(
                    &email,
                    "Your upcoming booking was cancelled",
                    &format!(
                        "<p>Hi {name},</p>\
                         <p>The previous rental of your booked car was not returned in time, so your \
                         booking had to be cancelled. Your payment has been refunded in full and you \
                         are entitled to a compensation of {compensation} cents.</p>"
                    ),
                )
                .await;
        }
    }
}

/// Whether a booking's owner escrow may be released.
///
/// True once the booking is completed/done, once the free-cancellation
/// window (3 days before start) has closed, or once more than half the
/// rental duration has elapsed.
pub fn unlock_due(
    status: BookingStatus,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    if matches!(status, BookingStatus::Completed | BookingStatus::Done) {
        return true;
    }
    if now >= start_time - Duration::days(PRE_START_CANCEL_DAYS) {
        return true;
    }
    let midpoint = start_time + (end_time - start_time) / 2;
    now >= midpoint
}

/// Release owner escrow for every eligible booking in one statement.
///
/// Mirrors [`unlock_due`]: completed/done, past the 3-day pre-start
/// cancellation window, or past half the rental duration. Credits are
/// summed per owner before the balance update so multiple bookings for one
/// owner all land. Completed bookings flip to `done` as they settle.
pub async fn release_owner_balances(pool: &DbPool) -> Result<u64, AppError> {
    let affected = sqlx::query(
        r#"
        WITH eligible AS (
            SELECT id, owner_id, owner_locked_amount_cents, status
            FROM bookings
            WHERE owner_locked_amount_cents > 0
              AND ( status IN ('completed', 'done')
                 OR NOW() >= start_time - INTERVAL '3 days'
                 OR NOW() >= start_time + (end_time - start_time) / 2 )
            FOR UPDATE
        ),
        credited AS (
            UPDATE users u
            SET balance_cents = u.balance_cents + s.total, updated_at = NOW()
            FROM (
                SELECT owner_id, SUM(owner_locked_amount_cents) AS total
                FROM eligible
                GROUP BY owner_id
            ) s
            WHERE u.id = s.owner_id
        )
        UPDATE bookings b
        SET owner_locked_amount_cents = 0,
            status = CASE WHEN e.status = 'completed' THEN 'done'::booking_status ELSE b.status END,
            updated_at = NOW()
        FROM eligible e
        WHERE b.id = e.id
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    Ok(affected)
}

/// Ban payers whose compensation deadline passed unpaid.
///
/// The conditional `is_banned = FALSE` predicate makes repeated runs
/// no-ops for already-banned users.
pub async fn ban_overdue_compensations(pool: &DbPool, mailer: &Mailer) -> Result<u64, AppError> {
    let overdue: Vec<(Uuid, String, String)> = sqlx::query_as(
        r#"
        SELECT u.id, u.email, u.name
        FROM booking_reports r
        JOIN users u ON u.id = r.compensation_payer_id
        WHERE r.status = 'resolved'
          AND r.compensation_paid = FALSE
          AND r.compensation_deadline < NOW()
          AND u.is_banned = FALSE
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut banned = 0u64;

    for (payer_id, email, name) in overdue {
        let affected = sqlx::query(
            "UPDATE users SET is_banned = TRUE, updated_at = NOW() WHERE id = $1 AND is_banned = FALSE",
        )
        .bind(payer_id)
        .execute(pool)
        .await?
        .rows_affected();

        if affected == 0 {
            continue;
        }
        banned += 1;

        mailer
            .send(
                &email,
                "Your account has been suspended",
                &format!(
                    "<p>Hi {name},</p>\
                     <p>The compensation you were required to pay was not received by its \
                     deadline, so your account has been suspended. Contact support to settle \
                     the outstanding amount.</p>"
                ),
            )
            .await;
    }

    Ok(banned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    #[test]
    fn reminder_offsets_are_ordered_and_end_at_72h() {
        let offsets: Vec<_> = ReminderStep::ALL.iter().map(|s| s.offset()).collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            ReminderStep::Expire72h.offset(),
            std::time::Duration::from_secs(72 * 3600)
        );
    }

    #[test]
    fn bump_window_is_half_open_six_hours() {
        let end = at(0);
        assert!(within_bump_window(end, end));
        assert!(within_bump_window(end, at(3)));
        assert!(within_bump_window(end, at(5)));
        // Exactly six hours is outside
        assert!(!within_bump_window(end, at(6)));
        // Starting before the overdue end is not a bump
        assert!(!within_bump_window(end, at(-1)));
    }

    #[test]
    fn compensation_is_thirty_percent_rounded_down() {
        assert_eq!(compensation_cents(100_000), 30_000);
        assert_eq!(compensation_cents(99), 29);
        assert_eq!(compensation_cents(0), 0);
    }

    #[test]
    fn escrow_unlocks_for_settled_bookings() {
        let (start, end) = (at(24 * 10), at(24 * 12));
        assert!(unlock_due(BookingStatus::Completed, start, end, at(0)));
        assert!(unlock_due(BookingStatus::Done, start, end, at(0)));
    }

    #[test]
    fn escrow_unlocks_once_cancellation_window_closes() {
        let (start, end) = (at(24 * 10), at(24 * 12));
        // 4 days out: driver can still cancel freely, keep the lock
        assert!(!unlock_due(BookingStatus::Approved, start, end, at(24 * 6)));
        // 3 days out: window closed
        assert!(unlock_due(BookingStatus::Approved, start, end, at(24 * 7)));
    }

    #[test]
    fn escrow_unlocks_past_half_duration() {
        let (start, end) = (at(0), at(48));
        assert!(unlock_due(BookingStatus::Ongoing, start, end, at(24)));
        assert!(unlock_due(BookingStatus::Ongoing, start, end, at(25)));
    }

    #[test]
    fn expiry_predicate_excludes_already_expired_rows() {
        // The SQL predicate in expire_stale_bookings only matches pending
        // and approved rows; once a row is expired it can never match
        // again, which is what makes the job idempotent.
        fn is_stale(status: BookingStatus, start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
            match status {
                BookingStatus::Pending => now - start > Duration::days(PENDING_EXPIRY_DAYS),
                BookingStatus::Approved => now - start > Duration::days(APPROVED_EXPIRY_DAYS),
                _ => false,
            }
        }

        let now = at(24 * 40);
        assert!(is_stale(BookingStatus::Pending, at(0), now));
        assert!(is_stale(BookingStatus::Approved, at(24 * 38), now));
        assert!(!is_stale(BookingStatus::Pending, at(24 * 20), now));
        // A row the first run expired no longer matches
        assert!(!is_stale(BookingStatus::Expired, at(0), now));
        assert!(!is_stale(BookingStatus::Cancelled, at(0), now));
    }
}
