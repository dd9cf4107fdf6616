//! GPS device assignment state machine.
//!
//! A device moves `available -> in_used -> available`; `maintenance` is an
//! admin side state reachable only while unassigned. At most one active
//! `car_gps` association exists per device, enforced by a partial unique
//! index and re-checked here.
//!
//! Every operation runs in one database transaction and takes `FOR UPDATE`
//! on the device row first, so two concurrent mutations of the same device
//! serialize at the store instead of racing. Partial failure can never
//! leave an orphan `in_used` device without an association.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::Lifecycle;
use crate::models::gps_device::{CarGps, GpsDevice, GpsDeviceStatus};

/// How assignment treats the device row found (or not) for a hardware id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceRegistration {
    /// No row under this hardware id: insert a fresh `in_used` device.
    Create,
    /// Soft-deleted row under this hardware id: bring it back active and
    /// `in_used`. The unique `os_build_id` column makes an INSERT here a
    /// constraint violation, so restoring is the only valid path.
    Restore,
    /// Live `available` row: flip it to `in_used`.
    Reuse,
}

fn registration_for(
    existing: Option<(GpsDeviceStatus, Lifecycle)>,
) -> Result<DeviceRegistration, AppError> {
    match existing {
        None => Ok(DeviceRegistration::Create),
        Some((_, Lifecycle::Deleted)) => Ok(DeviceRegistration::Restore),
        Some((status, Lifecycle::Active)) if status.can_assign() => Ok(DeviceRegistration::Reuse),
        Some(_) => Err(AppError::Conflict("device is not available".to_string())),
    }
}

/// How a switch treats the association row found (or not) for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchAction {
    /// No row at all: insert a fresh association.
    CreateNew,
    /// Active row pointing at another car: demote that car to `pending`
    /// and repoint the row.
    RepointAndDemote,
    /// Row for the target car, active or soft-deleted: update it in place,
    /// reviving it if needed. Dead rows are reused rather than duplicated.
    RestoreInPlace,
}

fn switch_action(existing: Option<(Lifecycle, bool)>) -> SwitchAction {
    match existing {
        None => SwitchAction::CreateNew,
        Some((Lifecycle::Active, false)) => SwitchAction::RepointAndDemote,
        Some(_) => SwitchAction::RestoreInPlace,
    }
}

/// Assign a device (looked up by hardware id) to a car.
///
/// # Process
///
/// 1. Car must exist and be active.
/// 2. The device is looked up by hardware id with deleted rows included:
///    the `os_build_id` column is globally unique, so a previously
///    soft-deleted unit reporting the same id is restored (active,
///    `in_used`, current name) rather than re-inserted. A live device must
///    be `available` and is flipped to `in_used`; an unknown id is created
///    directly as `in_used`.
/// 3. A soft-deleted association for this (car, device) pair is restored
///    with the new location; an active one is a conflict; otherwise a new
///    row is inserted.
///
/// Returns the device (freshly created ones carry their generated id).
///
/// # Errors
///
/// - `NotFound("car")`: car missing or deleted
/// - `Conflict("device is not available")`: device is in use or in maintenance
/// - `Conflict("association already exists")`: pair already actively bound
pub async fn assign_device_to_car(
    pool: &DbPool,
    car_id: Uuid,
    os_build_id: &str,
    device_name: &str,
    longitude: f64,
    latitude: f64,
) -> Result<GpsDevice, AppError> {
    let mut tx = pool.begin().await?;

    require_active_car(&mut tx, car_id).await?;

    // Lock the device row for the whole operation. Deleted rows are
    // included: os_build_id is globally unique, so a dead row under this
    // hardware id must be restored, not shadowed by an INSERT.
    let existing = sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE os_build_id = $1 FOR UPDATE",
    )
    .bind(os_build_id)
    .fetch_optional(&mut *tx)
    .await?;

    let registration = registration_for(existing.as_ref().map(|d| (d.status, d.lifecycle)))?;

    let device = match registration {
        DeviceRegistration::Restore => {
            // Re-register a previously deleted unit under its hardware id
            let device = existing.ok_or(AppError::NotFound("device"))?;
            sqlx::query_as::<_, GpsDevice>(
                r#"
                UPDATE gps_devices
                SET lifecycle = 'active', status = $1, name = $2, updated_at = NOW()
                WHERE id = $3
                RETURNING *
                "#,
            )
            .bind(GpsDeviceStatus::InUsed)
            .bind(device_name)
            .bind(device.id)
            .fetch_one(&mut *tx)
            .await?
        }
        DeviceRegistration::Reuse => {
            let device = existing.ok_or(AppError::NotFound("device"))?;
            sqlx::query_as::<_, GpsDevice>(
                "UPDATE gps_devices SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
            )
            .bind(GpsDeviceStatus::InUsed)
            .bind(device.id)
            .fetch_one(&mut *tx)
            .await?
        }
        DeviceRegistration::Create => {
            sqlx::query_as::<_, GpsDevice>(
                r#"
                INSERT INTO gps_devices (os_build_id, name, status)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(os_build_id)
            .bind(device_name)
            .bind(GpsDeviceStatus::InUsed)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    // Find any association for this exact pair, deleted rows included
    let association = sqlx::query_as::<_, CarGps>(
        "SELECT * FROM car_gps WHERE car_id = $1 AND device_id = $2",
    )
    .bind(car_id)
    .bind(device.id)
    .fetch_optional(&mut *tx)
    .await?;

    match association {
        Some(assoc) if assoc.lifecycle == Lifecycle::Active => {
            return Err(AppError::Conflict("association already exists".to_string()));
        }
        Some(assoc) => {
            // Restore the soft-deleted association with the new location
            sqlx::query(
                r#"
                UPDATE car_gps
                SET lifecycle = 'active', longitude = $1, latitude = $2, updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(longitude)
            .bind(latitude)
            .bind(assoc.id)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO car_gps (car_id, device_id, longitude, latitude)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(car_id)
            .bind(device.id)
            .bind(longitude)
            .bind(latitude)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(device)
}

/// Rebind an existing device to a (possibly different) car.
///
/// If the device currently has an active association to another car, that
/// car's status is forced to `pending` (bypassing lifecycle filters)
/// before the association is repointed. This is the only operation that
/// silently changes a car's status as a side effect.
pub async fn switch_gps_device_for_car(
    pool: &DbPool,
    device_id: Uuid,
    car_id: Uuid,
    longitude: f64,
    latitude: f64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let device = sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE id = $1 AND lifecycle = 'active' FOR UPDATE",
    )
    .bind(device_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("device"))?;

    require_active_car(&mut tx, car_id).await?;

    // The device's active association wins; failing that, a soft-deleted
    // row for this exact (car, device) pair is a restore candidate.
    let association = sqlx::query_as::<_, CarGps>(
        r#"
        SELECT * FROM car_gps
        WHERE device_id = $1 AND (lifecycle = 'active' OR car_id = $2)
        ORDER BY (lifecycle = 'active') DESC, updated_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(device_id)
    .bind(car_id)
    .fetch_optional(&mut *tx)
    .await?;

    let action = switch_action(
        association
            .as_ref()
            .map(|a| (a.lifecycle, a.car_id == car_id)),
    );

    match (action, association) {
        (SwitchAction::RepointAndDemote, Some(assoc)) => {
            // Demote the car losing its device; no lifecycle filter here
            sqlx::query("UPDATE cars SET status = 'pending', updated_at = NOW() WHERE id = $1")
                .bind(assoc.car_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                UPDATE car_gps
                SET car_id = $1, longitude = $2, latitude = $3,
                    lifecycle = 'active', updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(car_id)
            .bind(longitude)
            .bind(latitude)
            .bind(assoc.id)
            .execute(&mut *tx)
            .await?;
        }
        (SwitchAction::RestoreInPlace, Some(assoc)) => {
            // Same car: refresh the location in place, reviving the row if
            // it had been soft-deleted
            sqlx::query(
                r#"
                UPDATE car_gps
                SET longitude = $1, latitude = $2, lifecycle = 'active', updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(longitude)
            .bind(latitude)
            .bind(assoc.id)
            .execute(&mut *tx)
            .await?;
        }
        _ => {
            sqlx::query(
                r#"
                INSERT INTO car_gps (car_id, device_id, longitude, latitude)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(car_id)
            .bind(device_id)
            .bind(longitude)
            .bind(latitude)
            .execute(&mut *tx)
            .await?;
        }
    }

    if device.status != GpsDeviceStatus::InUsed {
        sqlx::query("UPDATE gps_devices SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(GpsDeviceStatus::InUsed)
            .bind(device_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Remove a device from its car.
///
/// Guarded by two car-level preconditions so devices are never stripped off
/// mid-booking by accident:
///
/// - the car must have an `in_progress` inspection schedule of type
///   `change_gps`, and
/// - the car must have no bookings in pending / approved / ready_for_pickup
///   / ongoing.
///
/// The device returns to `available`, contracts referencing it have their
/// device pointer cleared, and the association row is physically deleted,
/// unlike "switch" which keeps the row.
pub async fn unassign_gps_device_for_car(pool: &DbPool, device_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE id = $1 AND lifecycle = 'active' FOR UPDATE",
    )
    .bind(device_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("device"))?;

    let association =
        sqlx::query_as::<_, CarGps>("SELECT * FROM car_gps WHERE device_id = $1 AND lifecycle = 'active'")
            .bind(device_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Conflict("device is not assigned to any car".to_string()))?;

    let has_inspection: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM inspection_schedules
            WHERE car_id = $1 AND inspection_type = 'change_gps' AND status = 'in_progress'
        )
        "#,
    )
    .bind(association.car_id)
    .fetch_one(&mut *tx)
    .await?;

    if !has_inspection {
        return Err(AppError::Conflict(
            "car has no in-progress GPS change inspection".to_string(),
        ));
    }

    let has_blocking_bookings: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM bookings
            WHERE car_id = $1
              AND status IN ('pending', 'approved', 'ready_for_pickup', 'ongoing')
        )
        "#,
    )
    .bind(association.car_id)
    .fetch_one(&mut *tx)
    .await?;

    if has_blocking_bookings {
        return Err(AppError::Conflict(
            "car has bookings in progress".to_string(),
        ));
    }

    // Contracts keep existing but lose their device reference
    sqlx::query("UPDATE contracts SET gps_device_id = NULL WHERE gps_device_id = $1")
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

    // Hard delete, not a lifecycle flip
    sqlx::query("DELETE FROM car_gps WHERE id = $1")
        .bind(association.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE gps_devices SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(GpsDeviceStatus::Available)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

/// Put an unassigned device into maintenance.
pub async fn set_maintenance(pool: &DbPool, device_id: Uuid) -> Result<GpsDevice, AppError> {
    let mut tx = pool.begin().await?;

    let device = sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE id = $1 AND lifecycle = 'active' FOR UPDATE",
    )
    .bind(device_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("device"))?;

    if !device.status.can_enter_maintenance() {
        return Err(AppError::Conflict(
            "only available devices can enter maintenance".to_string(),
        ));
    }

    let device = sqlx::query_as::<_, GpsDevice>(
        "UPDATE gps_devices SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(GpsDeviceStatus::Maintenance)
    .bind(device_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(device)
}

/// Soft-delete a device that has no active car association.
pub async fn delete_device(pool: &DbPool, device_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE id = $1 AND lifecycle = 'active' FOR UPDATE",
    )
    .bind(device_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("device"))?;

    let has_association: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM car_gps WHERE device_id = $1 AND lifecycle = 'active')",
    )
    .bind(device_id)
    .fetch_one(&mut *tx)
    .await?;

    if has_association {
        return Err(AppError::Conflict(
            "device is still assigned to a car".to_string(),
        ));
    }

    sqlx::query("UPDATE gps_devices SET lifecycle = 'deleted', updated_at = NOW() WHERE id = $1")
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

/// List devices, active rows only.
pub async fn list_devices(pool: &DbPool) -> Result<Vec<GpsDevice>, AppError> {
    let devices = sqlx::query_as::<_, GpsDevice>(
        "SELECT * FROM gps_devices WHERE lifecycle = 'active' ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(devices)
}

/// Car existence guard shared by assign and switch.
async fn require_active_car(
    tx: &mut Transaction<'_, Postgres>,
    car_id: Uuid,
) -> Result<(), AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cars WHERE id = $1 AND lifecycle = 'active')")
            .bind(car_id)
            .fetch_one(&mut **tx)
            .await?;

    if !exists {
        return Err(AppError::NotFound("car"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hardware_id_creates_a_device() {
        assert_eq!(
            registration_for(None).ok(),
            Some(DeviceRegistration::Create)
        );
    }

    #[test]
    fn deleted_device_is_restored_not_reinserted() {
        // os_build_id is globally unique, so re-registering a soft-deleted
        // unit must reuse its row; an INSERT would hit the constraint.
        for status in [
            GpsDeviceStatus::Available,
            GpsDeviceStatus::InUsed,
            GpsDeviceStatus::Maintenance,
        ] {
            assert_eq!(
                registration_for(Some((status, Lifecycle::Deleted))).ok(),
                Some(DeviceRegistration::Restore)
            );
        }
    }

    #[test]
    fn live_device_assignment_respects_status() {
        assert_eq!(
            registration_for(Some((GpsDeviceStatus::Available, Lifecycle::Active))).ok(),
            Some(DeviceRegistration::Reuse)
        );
        for status in [GpsDeviceStatus::InUsed, GpsDeviceStatus::Maintenance] {
            assert!(matches!(
                registration_for(Some((status, Lifecycle::Active))),
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[test]
    fn switch_repoints_only_live_foreign_associations() {
        assert_eq!(
            switch_action(Some((Lifecycle::Active, false))),
            SwitchAction::RepointAndDemote
        );
        assert_eq!(
            switch_action(Some((Lifecycle::Active, true))),
            SwitchAction::RestoreInPlace
        );
    }

    #[test]
    fn switch_revives_a_dead_row_for_the_same_car() {
        assert_eq!(
            switch_action(Some((Lifecycle::Deleted, true))),
            SwitchAction::RestoreInPlace
        );
        assert_eq!(switch_action(None), SwitchAction::CreateNew);
    }
}
