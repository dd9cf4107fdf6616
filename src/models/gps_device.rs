//! GPS device and car association models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Lifecycle;

/// Physical state of a GPS tracking unit.
///
/// `Maintenance` is an admin-only side state reachable only from
/// `Available`; a device that is attached to a car can never be pulled
/// into maintenance directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gps_device_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GpsDeviceStatus {
    Available,
    InUsed,
    Maintenance,
}

impl GpsDeviceStatus {
    /// Whether a device in this state may be bound to a car.
    pub fn can_assign(self) -> bool {
        matches!(self, GpsDeviceStatus::Available)
    }

    /// Whether a device in this state may enter maintenance.
    pub fn can_enter_maintenance(self) -> bool {
        matches!(self, GpsDeviceStatus::Available)
    }
}

/// Represents a GPS device record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GpsDevice {
    pub id: Uuid,

    /// Hardware identifier reported by the unit, unique across the fleet.
    pub os_build_id: String,

    pub name: String,

    pub status: GpsDeviceStatus,

    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Association record binding one device to one car, carrying the last
/// known location.
///
/// At most one **active** row may exist per device (partial unique index);
/// switching a device to another car repoints this row, unassigning deletes
/// it outright.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CarGps {
    pub id: Uuid,

    pub car_id: Uuid,

    pub device_id: Uuid,

    pub longitude: f64,

    pub latitude: f64,

    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for assigning a device (by hardware id) to a car.
#[derive(Debug, Deserialize)]
pub struct AssignDeviceRequest {
    pub car_id: Uuid,
    pub os_build_id: String,
    pub device_name: String,
    pub longitude: f64,
    pub latitude: f64,
}

/// Request body for switching an existing device to another car.
#[derive(Debug, Deserialize)]
pub struct SwitchDeviceRequest {
    pub car_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
}

/// Response body for device endpoints.
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub id: Uuid,
    pub os_build_id: String,
    pub name: String,
    pub status: GpsDeviceStatus,
    pub created_at: DateTime<Utc>,
}

impl From<GpsDevice> for DeviceResponse {
    fn from(device: GpsDevice) -> Self {
        Self {
            id: device.id,
            os_build_id: device.os_build_id,
            name: device.name,
            status: device.status,
            created_at: device.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_available_devices_are_assignable() {
        assert!(GpsDeviceStatus::Available.can_assign());
        assert!(!GpsDeviceStatus::InUsed.can_assign());
        assert!(!GpsDeviceStatus::Maintenance.can_assign());
    }

    #[test]
    fn maintenance_is_unreachable_while_in_use() {
        assert!(GpsDeviceStatus::Available.can_enter_maintenance());
        assert!(!GpsDeviceStatus::InUsed.can_enter_maintenance());
        assert!(!GpsDeviceStatus::Maintenance.can_enter_maintenance());
    }
}
