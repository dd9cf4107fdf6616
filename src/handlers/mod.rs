//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Checks role capabilities and delegates to a service
//! 3. Returns a JSON response or a typed [`crate::error::AppError`]

/// Booking lifecycle endpoints
pub mod bookings;
/// Car listing endpoints
pub mod cars;
/// GPS device fleet endpoints
pub mod devices;
/// Health check endpoint
pub mod health;
/// Inspection workflow endpoints
pub mod inspections;
/// Incident report endpoints
pub mod reports;
/// Account and licensing endpoints
pub mod users;
