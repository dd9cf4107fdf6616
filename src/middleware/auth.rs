//! Access token authentication middleware.
//!
//! Every protected request carries `Authorization: Bearer <token>`. The
//! token is hashed with SHA-256 and looked up against active, unbanned
//! users; the matching user's id and role become the request's
//! [`AuthContext`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::Role;
use crate::services::user_service::hash_token;
use crate::state::AppState;

/// Authenticated principal attached to the request.
///
/// Handlers receive this explicitly via `Extension<AuthContext>`; there is
/// no ambient current-user state anywhere in the codebase.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

/// Bearer token authentication.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>`
/// 2. SHA-256 the token and look the hash up among active users
/// 3. Banned users are rejected with 403, unknown tokens with 401
/// 4. Inject [`AuthContext`] and call the next handler
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let token_hash = hash_token(token);

    let user: (Uuid, Role, bool) = sqlx::query_as(
        r#"
        SELECT id, role, is_banned
        FROM users
        WHERE access_token_hash = $1 AND lifecycle = 'active'
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let (user_id, role, is_banned) = user;
    if is_banned {
        return Err(AppError::Forbidden("account is suspended"));
    }

    request
        .extensions_mut()
        .insert(AuthContext { user_id, role });

    Ok(next.run(request).await)
}
