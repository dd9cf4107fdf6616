//! Car model and API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Lifecycle;

/// Listing state of a car.
///
/// `Pending` means the car is not bookable: newly listed, or demoted after
/// its GPS device was reassigned to another car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "car_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CarStatus {
    Pending,
    Available,
    Rented,
    Inactive,
}

/// Represents a car record from the database.
///
/// The license plate is PII and stored encrypted like user phone numbers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Car {
    pub id: Uuid,

    pub owner_id: Uuid,

    pub model: String,

    pub license_plate_cipher: String,

    pub license_plate_key_id: Uuid,

    pub status: CarStatus,

    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for listing a new car.
#[derive(Debug, Deserialize)]
pub struct CreateCarRequest {
    pub model: String,
    /// Plaintext license plate; encrypted before storage.
    pub license_plate: String,
}

/// Response body for car endpoints; plate is the decrypted copy.
#[derive(Debug, Serialize)]
pub struct CarResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub model: String,
    pub license_plate: String,
    pub status: CarStatus,
    pub created_at: DateTime<Utc>,
}

impl CarResponse {
    pub fn from_car(car: Car, license_plate: String) -> Self {
        Self {
            id: car.id,
            owner_id: car.owner_id,
            model: car.model,
            license_plate,
            status: car.status,
            created_at: car.created_at,
        }
    }
}
