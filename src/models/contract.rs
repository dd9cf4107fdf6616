//! Rental contract model.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Contract issued for a booking, pinning the car and the GPS device that
/// tracked the rental.
///
/// `gps_device_id` is cleared when the device is unassigned from the car;
/// the contract itself survives for the paper trail.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Contract {
    pub id: Uuid,

    pub booking_id: Uuid,

    pub car_id: Uuid,

    pub gps_device_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}
