//! Incident/dispute report model and API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review state of a report. `Resolved` and `Rejected` are terminal once a
/// compensation determination exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    UnderReview,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, UnderReview | Rejected) | (UnderReview, Resolved | Rejected)
        )
    }
}

/// Represents a booking report record from the database.
///
/// The compensation sub-record (payer, amount, paid flag, proof, deadline)
/// is nullable as a block: it exists only for resolved reports that carry a
/// monetary determination. An unpaid compensation past its deadline gets
/// the payer banned by a background job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingReport {
    pub id: Uuid,

    pub booking_id: Uuid,

    pub reporter_id: Uuid,

    pub title: String,

    pub description: String,

    pub image_url: Option<String>,

    pub status: ReportStatus,

    pub compensation_payer_id: Option<Uuid>,

    pub compensation_amount_cents: Option<i64>,

    pub compensation_paid: bool,

    pub compensation_proof_url: Option<String>,

    pub compensation_deadline: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Request body for filing a report against a booking.
#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub booking_id: Uuid,
    pub title: String,
    pub description: String,
    /// Evidence photo, base64 encoded; uploaded to the image store.
    pub image: Option<String>,
}

/// Staff resolution, optionally imposing compensation on one party.
#[derive(Debug, Deserialize)]
pub struct ResolveReportRequest {
    pub compensation_payer_id: Option<Uuid>,
    pub compensation_amount_cents: Option<i64>,
    pub compensation_deadline: Option<DateTime<Utc>>,
}

/// Payer's proof of compensation payment.
#[derive(Debug, Deserialize)]
pub struct CompensationPaymentRequest {
    /// Payment proof photo, base64 encoded.
    pub proof_image: String,
}

/// Response body for report endpoints.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reporter_id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub status: ReportStatus,
    pub compensation_payer_id: Option<Uuid>,
    pub compensation_amount_cents: Option<i64>,
    pub compensation_paid: bool,
    pub compensation_proof_url: Option<String>,
    pub compensation_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingReport> for ReportResponse {
    fn from(r: BookingReport) -> Self {
        Self {
            id: r.id,
            booking_id: r.booking_id,
            reporter_id: r.reporter_id,
            title: r.title,
            description: r.description,
            image_url: r.image_url,
            status: r.status,
            compensation_payer_id: r.compensation_payer_id,
            compensation_amount_cents: r.compensation_amount_cents,
            compensation_paid: r.compensation_paid,
            compensation_proof_url: r.compensation_proof_url,
            compensation_deadline: r.compensation_deadline,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReportStatus::*;

    #[test]
    fn determinations_are_terminal() {
        for from in [Resolved, Rejected] {
            for to in [Pending, UnderReview, Resolved, Rejected] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn review_flow() {
        assert!(Pending.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Resolved));
        assert!(UnderReview.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Resolved));
    }
}
