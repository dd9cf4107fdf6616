//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers. They
//! own database transactions, precondition checks and the calls to outside
//! collaborators (mail provider, image store).

pub mod booking_service;
pub mod device_service;
pub mod email_service;
pub mod image_service;
pub mod inspection_service;
pub mod pii_service;
pub mod report_service;
pub mod user_service;
