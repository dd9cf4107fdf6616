//! Booking model, status machine and API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rental lifecycle states.
///
/// `Rejected`, `Expired`, `Cancelled` and `Done` are final: no user action
/// or job moves a booking out of them. `Completed` admits exactly one
/// further step, the settlement flip to `Done` once the owner's escrow is
/// released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    ReadyForPickup,
    Ongoing,
    Completed,
    Done,
    Rejected,
    Expired,
    Cancelled,
}

impl BookingStatus {
    /// States from which nothing further may happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Done
                | BookingStatus::Rejected
                | BookingStatus::Expired
                | BookingStatus::Cancelled
        )
    }

    /// The full transition table. Every status change in handlers and jobs
    /// goes through a conditional UPDATE whose predicate mirrors this.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected | Expired | Cancelled)
                | (Approved, ReadyForPickup | Expired | Cancelled)
                | (ReadyForPickup, Ongoing)
                | (Ongoing, Completed)
                | (Completed, Done)
        )
    }
}

/// Represents a booking record from the database.
///
/// Monetary fields are cents (`i64`); `total_amount_cents` is always the
/// sum of base price, platform fee and excess-day fee (CHECK constraint
/// plus [`Booking::money_consistent`]).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,

    pub car_id: Uuid,

    pub driver_id: Uuid,

    pub owner_id: Uuid,

    pub status: BookingStatus,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    pub base_price_cents: i64,

    pub platform_fee_cents: i64,

    pub excess_day_fee_cents: i64,

    pub total_amount_cents: i64,

    /// Gates all balance movements: refunds only happen for paid bookings.
    pub is_paid: bool,

    /// Set exactly once when a refund is credited; guards double-refunds.
    pub is_refund: bool,

    pub is_car_returned: bool,

    /// Owner earnings held in escrow until the risk windows pass.
    pub owner_locked_amount_cents: i64,

    /// Human-readable audit trail appended to by jobs.
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Platform fee: 10% of the base price.
pub fn platform_fee_cents(base_price_cents: i64) -> i64 {
    base_price_cents / 10
}

impl Booking {
    /// Monetary invariant: total is the exact sum of its parts.
    pub fn money_consistent(&self) -> bool {
        self.total_amount_cents
            == self.base_price_cents + self.platform_fee_cents + self.excess_day_fee_cents
    }
}

/// Request body for creating a booking.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub car_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Agreed rental price in cents; fees are computed server-side.
    pub base_price_cents: i64,
}

/// Response body for booking endpoints.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub car_id: Uuid,
    pub driver_id: Uuid,
    pub owner_id: Uuid,
    pub status: BookingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_price_cents: i64,
    pub platform_fee_cents: i64,
    pub excess_day_fee_cents: i64,
    pub total_amount_cents: i64,
    pub is_paid: bool,
    pub is_refund: bool,
    pub is_car_returned: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            car_id: b.car_id,
            driver_id: b.driver_id,
            owner_id: b.owner_id,
            status: b.status,
            start_time: b.start_time,
            end_time: b.end_time,
            base_price_cents: b.base_price_cents,
            platform_fee_cents: b.platform_fee_cents,
            excess_day_fee_cents: b.excess_day_fee_cents,
            total_amount_cents: b.total_amount_cents,
            is_paid: b.is_paid,
            is_refund: b.is_refund,
            is_car_returned: b.is_car_returned,
            note: b.note,
            created_at: b.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 9] = [
        Pending,
        Approved,
        ReadyForPickup,
        Ongoing,
        Completed,
        Done,
        Rejected,
        Expired,
        Cancelled,
    ];

    #[test]
    fn terminal_states_reject_every_transition() {
        for from in [Done, Rejected, Expired, Cancelled] {
            assert!(from.is_terminal());
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn happy_path_is_reachable() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(ReadyForPickup));
        assert!(ReadyForPickup.can_transition_to(Ongoing));
        assert!(Ongoing.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Done));
    }

    #[test]
    fn cancellation_and_expiry_only_before_pickup() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Expired));
        assert!(Approved.can_transition_to(Expired));
        assert!(!ReadyForPickup.can_transition_to(Cancelled));
        assert!(!Ongoing.can_transition_to(Cancelled));
        assert!(!Ongoing.can_transition_to(Expired));
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!Pending.can_transition_to(Ongoing));
        assert!(!Approved.can_transition_to(Completed));
        assert!(!ReadyForPickup.can_transition_to(Done));
    }

    #[test]
    fn money_sum_invariant() {
        let booking = Booking {
            id: Uuid::new_v4(),
            car_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            status: Pending,
            start_time: Utc::now(),
            end_time: Utc::now(),
            base_price_cents: 100_000,
            platform_fee_cents: platform_fee_cents(100_000),
            excess_day_fee_cents: 5_000,
            total_amount_cents: 115_000,
            is_paid: false,
            is_refund: false,
            is_car_returned: false,
            owner_locked_amount_cents: 0,
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(booking.money_consistent());

        let broken = Booking {
            total_amount_cents: 114_999,
            ..booking
        };
        assert!(!broken.money_consistent());
    }
}
