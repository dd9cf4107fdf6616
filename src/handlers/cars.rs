//! Car listing HTTP handlers.
//!
//! - POST /api/v1/cars - List a new car (owner)
//! - GET /api/v1/cars/:id - Get one of the caller's cars
//! - GET /api/v1/cars - List the caller's cars
//! - PUT /api/v1/cars/:id/activate - Staff approves a pending car

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::car::{Car, CarResponse, CreateCarRequest},
    models::user::Role,
    services::pii_service,
    state::AppState,
};

/// List a new car. The license plate is PII and never stored in the clear;
/// new cars start `pending` until staff activates them.
pub async fn create_car(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCarRequest>,
) -> Result<Json<CarResponse>, AppError> {
    if auth.role != Role::Owner {
        return Err(AppError::Forbidden("owner role required"));
    }
    if request.model.trim().is_empty() || request.license_plate.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "model and license plate are required".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;

    let (plate_key_id, plate_cipher) =
        pii_service::seal(&mut tx, &request.license_plate, &state.master_key).await?;

    let car = sqlx::query_as::<_, Car>(
        r#"
        INSERT INTO cars (owner_id, model, license_plate_cipher, license_plate_key_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(&request.model)
    .bind(&plate_cipher)
    .bind(plate_key_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(CarResponse::from_car(car, request.license_plate)))
}

/// Get one of the caller's cars, plate decrypted.
pub async fn get_car(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(car_id): Path<Uuid>,
) -> Result<Json<CarResponse>, AppError> {
    let car = sqlx::query_as::<_, Car>(
        "SELECT * FROM cars WHERE id = $1 AND owner_id = $2 AND lifecycle = 'active'",
    )
    .bind(car_id)
    .bind(auth.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound("car"))?;

    let plate = pii_service::open(
        &state.pool,
        car.license_plate_key_id,
        &car.license_plate_cipher,
        &state.master_key,
    )
    .await?;

    Ok(Json(CarResponse::from_car(car, plate)))
}

/// List the caller's cars, newest first, plates decrypted.
pub async fn list_cars(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CarResponse>>, AppError> {
    let cars = sqlx::query_as::<_, Car>(
        "SELECT * FROM cars WHERE owner_id = $1 AND lifecycle = 'active' ORDER BY created_at DESC",
    )
    .bind(auth.user_id)
    .fetch_all(&state.pool)
    .await?;

    let mut responses = Vec::with_capacity(cars.len());
    for car in cars {
        let plate = pii_service::open(
            &state.pool,
            car.license_plate_key_id,
            &car.license_plate_cipher,
            &state.master_key,
        )
        .await?;
        responses.push(CarResponse::from_car(car, plate));
    }

    Ok(Json(responses))
}

/// Staff flips a pending car to available.
pub async fn activate_car(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(car_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !auth.role.is_staff() {
        return Err(AppError::Forbidden("staff role required"));
    }

    let updated = sqlx::query(
        "UPDATE cars SET status = 'available', updated_at = NOW() WHERE id = $1 AND lifecycle = 'active' AND status = 'pending'",
    )
    .bind(car_id)
    .execute(&state.pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::Conflict("car is not pending".to_string()));
    }

    Ok(Json(serde_json::json!({ "activated": true })))
}
