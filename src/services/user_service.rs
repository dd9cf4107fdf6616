//! User onboarding, licensing and account administration.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::key_management::MasterKey;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::user::{SignupRequest, User};
use crate::services::pii_service;

/// Create a user account.
///
/// The phone number is sealed (fresh data key, master-key wrapped) inside
/// the same transaction that inserts the user row. The access token is
/// returned exactly once; only its SHA-256 hash is stored.
pub async fn signup(
    pool: &DbPool,
    master: &MasterKey,
    request: &SignupRequest,
) -> Result<(User, String), AppError> {
    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "name and email are required".to_string(),
        ));
    }

    let email_taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&request.email)
            .fetch_one(pool)
            .await?;
    if email_taken {
        return Err(AppError::Conflict("email is already registered".to_string()));
    }

    let access_token = generate_access_token();
    let token_hash = hash_token(&access_token);

    let mut tx = pool.begin().await?;

    let (phone_key_id, phone_cipher) = pii_service::seal(&mut tx, &request.phone, master).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (role, name, email, access_token_hash, phone_cipher, phone_key_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(request.role)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&token_hash)
    .bind(&phone_cipher)
    .bind(phone_key_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((user, access_token))
}

/// Load a user with deleted rows excluded.
pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND lifecycle = 'active'")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("user"))
}

/// Store new license data for a user.
///
/// Seals the license number under a fresh key and resets the approval
/// tri-state to pending (NULL); any license change invalidates a previous
/// decision.
pub async fn update_license(
    pool: &DbPool,
    master: &MasterKey,
    user_id: Uuid,
    license_number: &str,
    license_image_url: Option<String>,
) -> Result<User, AppError> {
    if license_number.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "license number is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let (key_id, cipher) = pii_service::seal(&mut tx, license_number, master).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET license_number_cipher = $1,
            license_number_key_id = $2,
            license_image_url = COALESCE($3, license_image_url),
            license_approved = NULL,
            updated_at = NOW()
        WHERE id = $4 AND lifecycle = 'active'
        RETURNING *
        "#,
    )
    .bind(&cipher)
    .bind(key_id)
    .bind(&license_image_url)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("user"))?;

    tx.commit().await?;

    Ok(user)
}

/// Staff decision on a pending license.
pub async fn review_license(
    pool: &DbPool,
    user_id: Uuid,
    approved: bool,
) -> Result<User, AppError> {
    let user = get_user(pool, user_id).await?;

    if user.license_number_cipher.is_none() {
        return Err(AppError::Conflict(
            "user has no license data to review".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET license_approved = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(approved)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Admin ban/unban.
pub async fn set_ban(pool: &DbPool, user_id: Uuid, banned: bool) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET is_banned = $1, updated_at = NOW() WHERE id = $2 AND lifecycle = 'active' RETURNING *",
    )
    .bind(banned)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("user"))
}

/// Soft-delete an account. The row and its encrypted PII stay for audit;
/// the user can no longer authenticate.
pub async fn soft_delete(pool: &DbPool, user_id: Uuid) -> Result<(), AppError> {
    let updated = sqlx::query(
        "UPDATE users SET lifecycle = 'deleted', updated_at = NOW() WHERE id = $1 AND lifecycle = 'active'",
    )
    .bind(user_id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("user"));
    }

    Ok(())
}

/// 32 random bytes, hex encoded: the bearer access token.
fn generate_access_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 of a token, hex encoded, as stored in `access_token_hash`.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_hash_deterministically() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);

        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), hash_token(&b));
    }
}
