//! Encrypted-PII data access.
//!
//! `seal` and `open` are the only two paths a sensitive value takes in and
//! out of the database. Sealing always generates fresh key material and
//! inserts the `encryption_keys` row inside the caller's transaction, so a
//! field value and its key commit (or roll back) together.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::crypto::field_encryption::{decrypt_field, encrypt_field};
use crate::crypto::key_management::{MasterKey, WrappedKey, generate_data_key, wrap_key};
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::encryption_key::EncryptionKey;

/// Encrypt a plaintext field value for storage.
///
/// Generates a fresh (key, IV) pair for this one field instance, encrypts
/// the value, wraps the key under the master key and inserts the key row.
/// Returns the key row id and the ciphertext; the caller stores both on
/// its entity within the same transaction.
pub async fn seal(
    tx: &mut Transaction<'_, Postgres>,
    plaintext: &str,
    master: &MasterKey,
) -> Result<(Uuid, String), AppError> {
    let data_key = generate_data_key();
    let ciphertext = encrypt_field(plaintext, &data_key)?;
    let wrapped = wrap_key(&data_key, master)?;

    let key_id: Uuid = sqlx::query_scalar(
        "INSERT INTO encryption_keys (wrapped_key, iv) VALUES ($1, $2) RETURNING id",
    )
    .bind(&wrapped.wrapped_key)
    .bind(&wrapped.iv)
    .fetch_one(&mut **tx)
    .await?;

    Ok((key_id, ciphertext))
}

/// Decrypt a stored field value.
///
/// Loads the field's own key row, unwraps it with the master key and
/// decrypts the ciphertext. A missing key row is `NotFound`; a key or tag
/// mismatch surfaces as a fatal `Crypto` error.
pub async fn open(
    pool: &DbPool,
    key_id: Uuid,
    ciphertext: &str,
    master: &MasterKey,
) -> Result<String, AppError> {
    let key_row = sqlx::query_as::<_, EncryptionKey>(
        "SELECT id, wrapped_key, iv, created_at FROM encryption_keys WHERE id = $1",
    )
    .bind(key_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("encryption key"))?;

    let data_key = crate::crypto::key_management::unwrap_key(
        &WrappedKey {
            wrapped_key: key_row.wrapped_key,
            iv: key_row.iv,
        },
        master,
    )?;

    decrypt_field(ciphertext, &data_key)
}

/// Decrypt an optional (ciphertext, key id) column pair.
///
/// Returns `None` when the field was never written; treats a ciphertext
/// without a key id (or vice versa) as corruption.
pub async fn open_optional(
    pool: &DbPool,
    key_id: Option<Uuid>,
    ciphertext: Option<&str>,
    master: &MasterKey,
) -> Result<Option<String>, AppError> {
    match (key_id, ciphertext) {
        (Some(key_id), Some(ciphertext)) => Ok(Some(open(pool, key_id, ciphertext, master).await?)),
        (None, None) => Ok(None),
        _ => Err(AppError::Crypto(
            "encrypted field and key id are out of sync".to_string(),
        )),
    }
}
