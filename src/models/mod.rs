//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types shaped for the API. Status columns are
//! closed Rust enums mapped to PostgreSQL enum types, so an impossible
//! state is a compile error rather than a stray string.

/// Rental transaction between driver and car/owner
pub mod booking;
/// Incident/dispute reports tied to a booking
pub mod booking_report;
/// Owner-listed car
pub mod car;
/// Per-booking rental contract
pub mod contract;
/// Per-field data key rows
pub mod encryption_key;
/// Physical GPS tracking units and car associations
pub mod gps_device;
/// Technician inspection workflow records
pub mod inspection_schedule;
/// Platform accounts and roles
pub mod user;

use serde::{Deserialize, Serialize};

/// Soft-delete lifecycle tag carried by long-lived entities.
///
/// Rows are flipped to `Deleted` instead of being removed; every read path
/// states explicitly whether it includes deleted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lifecycle", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Deleted,
}
