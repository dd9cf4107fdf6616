//! Technician inspection workflow.
//!
//! Inspections gate sensitive fleet operations: an in-progress `change_gps`
//! inspection on a car is the authorization to remove its GPS device. The
//! machine is pending -> in_progress -> approved | rejected.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::inspection_schedule::{InspectionSchedule, InspectionStatus, InspectionType};

/// Schedule an inspection for a car, assigned to the calling technician.
pub async fn create_inspection(
    pool: &DbPool,
    technician_id: Uuid,
    car_id: Uuid,
    inspection_type: InspectionType,
    note: Option<String>,
) -> Result<InspectionSchedule, AppError> {
    let mut tx = pool.begin().await?;

    let car_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM cars WHERE id = $1 AND lifecycle = 'active')",
    )
    .bind(car_id)
    .fetch_one(&mut *tx)
    .await?;

    if !car_exists {
        return Err(AppError::NotFound("car"));
    }

    // One open inspection of a given type per car at a time
    let already_open: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM inspection_schedules
            WHERE car_id = $1 AND inspection_type = $2
              AND status IN ('pending', 'in_progress')
        )
        "#,
    )
    .bind(car_id)
    .bind(inspection_type)
    .fetch_one(&mut *tx)
    .await?;

    if already_open {
        return Err(AppError::Conflict(
            "car already has an open inspection of this type".to_string(),
        ));
    }

    let inspection = sqlx::query_as::<_, InspectionSchedule>(
        r#"
        INSERT INTO inspection_schedules (car_id, technician_id, inspection_type, note)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(car_id)
    .bind(technician_id)
    .bind(inspection_type)
    .bind(&note)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(inspection)
}

/// Move a pending inspection to in_progress.
pub async fn start_inspection(
    pool: &DbPool,
    inspection_id: Uuid,
) -> Result<InspectionSchedule, AppError> {
    transition(pool, inspection_id, InspectionStatus::InProgress).await
}

/// Conclude an in-progress inspection.
pub async fn conclude_inspection(
    pool: &DbPool,
    inspection_id: Uuid,
    approved: bool,
) -> Result<InspectionSchedule, AppError> {
    let next = if approved {
        InspectionStatus::Approved
    } else {
        InspectionStatus::Rejected
    };
    transition(pool, inspection_id, next).await
}

/// List inspections for one car, newest first.
pub async fn list_for_car(
    pool: &DbPool,
    car_id: Uuid,
) -> Result<Vec<InspectionSchedule>, AppError> {
    let inspections = sqlx::query_as::<_, InspectionSchedule>(
        "SELECT * FROM inspection_schedules WHERE car_id = $1 ORDER BY created_at DESC",
    )
    .bind(car_id)
    .fetch_all(pool)
    .await?;

    Ok(inspections)
}

async fn transition(
    pool: &DbPool,
    inspection_id: Uuid,
    next: InspectionStatus,
) -> Result<InspectionSchedule, AppError> {
    let mut tx = pool.begin().await?;
    let inspection = locked_inspection(&mut tx, inspection_id).await?;

    if !inspection.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "inspection cannot move from {:?} to {:?}",
            inspection.status, next
        )));
    }

    let inspection = sqlx::query_as::<_, InspectionSchedule>(
        "UPDATE inspection_schedules SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(next)
    .bind(inspection_id)
    .bind(inspection.status)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Conflict("inspection changed state concurrently".to_string()))?;

    tx.commit().await?;
    Ok(inspection)
}

async fn locked_inspection(
    tx: &mut Transaction<'_, Postgres>,
    inspection_id: Uuid,
) -> Result<InspectionSchedule, AppError> {
    sqlx::query_as::<_, InspectionSchedule>(
        "SELECT * FROM inspection_schedules WHERE id = $1 FOR UPDATE",
    )
    .bind(inspection_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound("inspection"))
}
