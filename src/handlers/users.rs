//! Account and licensing HTTP handlers.
//!
//! - POST /api/v1/users/signup - Create account (public)
//! - GET /api/v1/users/me - Own profile with decrypted PII
//! - PUT /api/v1/users/me/license - Submit license data
//! - POST /api/v1/users/:id/license/review - Staff license decision
//! - POST /api/v1/users/:id/ban - Admin ban/unban
//! - DELETE /api/v1/users/:id - Admin soft delete

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::user::{
        BanRequest, LicenseReviewRequest, SignupRequest, SignupResponse, UpdateLicenseRequest,
        UserResponse,
    },
    services::{image_service, pii_service, user_service},
    state::AppState,
};

/// Create a new account.
///
/// The phone number is encrypted before storage; the response carries the
/// access token exactly once.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    let (user, access_token) = user_service::signup(&state.pool, &state.master_key, &request).await?;

    // Echo back the plaintext the caller just sent instead of decrypting
    let response = UserResponse::from_user(user, request.phone, None);

    Ok(Json(SignupResponse {
        user: response,
        access_token,
    }))
}

/// Fetch the caller's own profile, PII decrypted.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::get_user(&state.pool, auth.user_id).await?;

    let phone = pii_service::open(
        &state.pool,
        user.phone_key_id,
        &user.phone_cipher,
        &state.master_key,
    )
    .await?;

    let license_number = pii_service::open_optional(
        &state.pool,
        user.license_number_key_id,
        user.license_number_cipher.as_deref(),
        &state.master_key,
    )
    .await?;

    Ok(Json(UserResponse::from_user(user, phone, license_number)))
}

/// Submit or replace license data. Resets the review state to pending.
pub async fn update_my_license(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<UpdateLicenseRequest>,
) -> Result<Json<UserResponse>, AppError> {
    // Upload the photo first so the database update sees the final URL
    let image_url = match &request.license_image {
        Some(encoded) => {
            let bytes = image_service::decode_image(encoded)?;
            Some(state.images.upload("license", bytes).await?)
        }
        None => None,
    };

    let user = user_service::update_license(
        &state.pool,
        &state.master_key,
        auth.user_id,
        &request.license_number,
        image_url,
    )
    .await?;

    let phone = pii_service::open(
        &state.pool,
        user.phone_key_id,
        &user.phone_cipher,
        &state.master_key,
    )
    .await?;

    Ok(Json(UserResponse::from_user(
        user,
        phone,
        Some(request.license_number),
    )))
}

/// Staff decision on a user's pending license.
pub async fn review_license(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<LicenseReviewRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !auth.role.is_staff() {
        return Err(AppError::Forbidden("staff role required"));
    }

    let user = user_service::review_license(&state.pool, user_id, request.approved).await?;

    let phone = pii_service::open(
        &state.pool,
        user.phone_key_id,
        &user.phone_cipher,
        &state.master_key,
    )
    .await?;

    Ok(Json(UserResponse::from_user(user, phone, None)))
}

/// Admin ban/unban toggle.
pub async fn set_ban(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<BanRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !auth.role.is_admin() {
        return Err(AppError::Forbidden("admin role required"));
    }

    let user = user_service::set_ban(&state.pool, user_id, request.banned).await?;

    let phone = pii_service::open(
        &state.pool,
        user.phone_key_id,
        &user.phone_cipher,
        &state.master_key,
    )
    .await?;

    Ok(Json(UserResponse::from_user(user, phone, None)))
}

/// Admin soft delete. The record and its encrypted PII remain for audit.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !auth.role.is_admin() {
        return Err(AppError::Forbidden("admin role required"));
    }

    user_service::soft_delete(&state.pool, user_id).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
