//! Per-field encryption key rows.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One symmetric key + IV pair dedicated to a single encrypted field
/// instance (one user's phone, one car's license plate, ...).
///
/// Rows are immutable after creation; key rotation writes a new row,
/// re-encrypts the field and orphans the old row. Keys are never reused
/// across fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EncryptionKey {
    pub id: Uuid,

    /// Data key wrapped under the master key (base64 of nonce || ciphertext).
    pub wrapped_key: String,

    /// Field IV, base64. Not secret on its own.
    pub iv: String,

    pub created_at: DateTime<Utc>,
}
