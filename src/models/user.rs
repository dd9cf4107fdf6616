//! User model, roles and API request/response types.
//!
//! Phone numbers and license numbers are stored as AES-GCM ciphertext with
//! a foreign key to the `encryption_keys` row holding their wrapped data
//! key; responses carry the decrypted values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Lifecycle;

/// Closed set of platform roles.
///
/// Permission checks are methods on this enum, so a new role forces every
/// capability decision to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Owner,
    Driver,
    Technician,
    Consultant,
}

impl Role {
    /// Admin-only operations: user management, device fleet, bans.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Staff who review licenses and handle booking reports.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Consultant)
    }

    /// Who may assign, switch and unassign GPS devices.
    pub fn can_manage_devices(self) -> bool {
        matches!(self, Role::Admin | Role::Technician)
    }
}

/// Represents a user record from the database.
///
/// Users are soft-deleted only (`lifecycle` flips to `deleted`), never
/// physically removed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    pub role: Role,

    pub name: String,

    pub email: String,

    /// SHA-256 hash of the bearer access token (64 hex chars).
    ///
    /// The token itself is shown once at signup and never stored.
    pub access_token_hash: String,

    /// Encrypted phone number (base64 AES-GCM ciphertext).
    pub phone_cipher: String,

    /// Key row that decrypts `phone_cipher`.
    pub phone_key_id: Uuid,

    pub license_number_cipher: Option<String>,

    pub license_number_key_id: Option<Uuid>,

    pub license_image_url: Option<String>,

    /// Tri-state license review: NULL = pending, true/false = decided.
    ///
    /// Reset to NULL whenever license data changes.
    pub license_approved: Option<bool>,

    pub is_banned: bool,

    /// Available balance in cents. Never negative (CHECK constraint).
    pub balance_cents: i64,

    pub lifecycle: Lifecycle,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new user.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    /// Plaintext phone number; encrypted before it touches the database.
    pub phone: String,
    pub role: Role,
}

/// Request body for updating license data.
///
/// Submitting this resets the review state to pending.
#[derive(Debug, Deserialize)]
pub struct UpdateLicenseRequest {
    /// Plaintext license number; encrypted before storage.
    pub license_number: String,
    /// License photo, base64 encoded; uploaded to the image store.
    pub license_image: Option<String>,
}

/// Admin decision on a pending license.
#[derive(Debug, Deserialize)]
pub struct LicenseReviewRequest {
    pub approved: bool,
}

/// Admin ban/unban toggle.
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub banned: bool,
}

/// Response body for user endpoints. PII fields are decrypted copies.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub license_number: Option<String>,
    pub license_image_url: Option<String>,
    pub license_approved: Option<bool>,
    pub is_banned: bool,
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    /// Build a response from the entity plus decrypted PII.
    pub fn from_user(user: User, phone: String, license_number: Option<String>) -> Self {
        Self {
            id: user.id,
            role: user.role,
            name: user.name,
            email: user.email,
            phone,
            license_number,
            license_image_url: user.license_image_url,
            license_approved: user.license_approved,
            is_banned: user.is_banned,
            balance_cents: user.balance_cents,
            created_at: user.created_at,
        }
    }
}

/// Signup response: the profile plus the access token, shown exactly once.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: UserResponse,
    /// Bearer token for the Authorization header. Not retrievable later.
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_management_is_admin_or_technician_only() {
        assert!(Role::Admin.can_manage_devices());
        assert!(Role::Technician.can_manage_devices());
        assert!(!Role::Owner.can_manage_devices());
        assert!(!Role::Driver.can_manage_devices());
        assert!(!Role::Consultant.can_manage_devices());
    }

    #[test]
    fn staff_capability_covers_admin_and_consultant() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Consultant.is_staff());
        assert!(!Role::Technician.is_staff());
        assert!(!Role::Driver.is_staff());
    }
}
