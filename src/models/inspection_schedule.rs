//! Technician inspection schedule model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the inspection is for. A `ChangeGps` inspection in progress is the
/// authorization to strip a GPS device off a car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inspection_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InspectionType {
    NewCar,
    Incident,
    ChangeGps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "inspection_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl InspectionStatus {
    /// Valid transitions: pending starts, in_progress concludes either way.
    pub fn can_transition_to(self, next: InspectionStatus) -> bool {
        use InspectionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (InProgress, Approved) | (InProgress, Rejected)
        )
    }
}

/// Represents an inspection schedule record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InspectionSchedule {
    pub id: Uuid,

    pub car_id: Uuid,

    pub technician_id: Uuid,

    pub inspection_type: InspectionType,

    pub status: InspectionStatus,

    pub note: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for scheduling an inspection.
#[derive(Debug, Deserialize)]
pub struct CreateInspectionRequest {
    pub car_id: Uuid,
    pub inspection_type: InspectionType,
    pub note: Option<String>,
}

/// Response body for inspection endpoints.
#[derive(Debug, Serialize)]
pub struct InspectionResponse {
    pub id: Uuid,
    pub car_id: Uuid,
    pub technician_id: Uuid,
    pub inspection_type: InspectionType,
    pub status: InspectionStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<InspectionSchedule> for InspectionResponse {
    fn from(s: InspectionSchedule) -> Self {
        Self {
            id: s.id,
            car_id: s.car_id,
            technician_id: s.technician_id,
            inspection_type: s.inspection_type,
            status: s.status,
            note: s.note,
            created_at: s.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InspectionStatus::*;

    #[test]
    fn pending_only_starts() {
        assert!(Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Rejected));
    }

    #[test]
    fn in_progress_concludes_either_way() {
        assert!(InProgress.can_transition_to(Approved));
        assert!(InProgress.can_transition_to(Rejected));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn conclusions_are_terminal() {
        for terminal in [Approved, Rejected] {
            for next in [Pending, InProgress, Approved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}
