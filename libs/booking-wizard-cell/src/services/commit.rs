// libs/booking-wizard-cell/src/services/commit.rs
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_clinic_api::{ClinicApiClient, ClinicApiError};
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::CommitError;
use crate::models::{AppointmentDraft, AppointmentStatus, BookingConfirmation};

#[derive(Debug, Deserialize)]
struct AppointmentRecord {
    id: Uuid,
    status: AppointmentStatus,
}

/// Submits a completed draft to the clinic platform as one atomic booking.
///
/// Every failure is folded into the three-case [`CommitError`] taxonomy so
/// callers decide recovery without reading HTTP responses: 409 means the
/// slot was taken, 422 means the clinic rejected the draft, and anything
/// else is transport trouble worth retrying.
pub struct BookingCommitClient {
    api: Arc<ClinicApiClient>,
}

impl BookingCommitClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ClinicApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    /// Submits the draft. The caller has already verified completeness; the
    /// guards here only keep a malformed draft from ever reaching the wire.
    pub async fn submit(
        &self,
        draft: &AppointmentDraft,
        patient_id: Uuid,
        session: &Session,
    ) -> Result<BookingConfirmation, CommitError> {
        let branch = draft
            .branch
            .as_ref()
            .ok_or_else(|| CommitError::ValidationRejected("no clinic branch selected".to_string()))?;
        let slot = draft
            .slot
            .as_ref()
            .ok_or_else(|| CommitError::ValidationRejected("no time slot selected".to_string()))?;
        let payment_method = draft
            .payment_method
            .ok_or_else(|| CommitError::ValidationRejected("no payment method selected".to_string()))?;

        info!(
            "Submitting booking for patient {} with doctor {} at branch {} (slot {})",
            patient_id, draft.doctor.id, branch.id, slot.id
        );

        let mut body = json!({
            "patient_id": patient_id,
            "doctor_id": draft.doctor.id,
            "branch_id": branch.id,
            "slot_id": slot.id,
            "appointment_date": slot.start_time,
            "duration_minutes": slot.duration_minutes,
            "payment_method": payment_method,
        });

        if let Some(clinic) = &draft.doctor_clinic {
            body["doctor_clinic_id"] = json!(clinic.id);
        }
        if let Some(member) = &draft.family_member {
            body["family_member_id"] = json!(member.id);
        }
        if let Some(notes) = &draft.notes {
            body["notes"] = json!(notes);
        }

        let record: AppointmentRecord = self
            .api
            .request(Method::POST, "/api/v1/appointments", Some(session), Some(body))
            .await
            .map_err(map_commit_error)?;

        info!(
            "Booking accepted: appointment {} for patient {}",
            record.id, patient_id
        );

        Ok(BookingConfirmation {
            appointment_id: record.id,
            status: record.status,
        })
    }
}

fn map_commit_error(err: ClinicApiError) -> CommitError {
    match err {
        ClinicApiError::Status { status, body } if status == StatusCode::CONFLICT => {
            warn!("Booking conflict from clinic API: {}", body);
            CommitError::SlotUnavailable
        }
        ClinicApiError::Status { status, body } if status == StatusCode::UNPROCESSABLE_ENTITY => {
            CommitError::ValidationRejected(rejection_reason(&body))
        }
        ClinicApiError::Status { status, body } => {
            CommitError::Transport(format!("clinic API returned {}: {}", status, body))
        }
        ClinicApiError::Transport(e) | ClinicApiError::Decode(e) => {
            CommitError::Transport(e.to_string())
        }
    }
}

/// Pulls a human-readable reason out of a rejection body, falling back to
/// the raw text when it is not the usual error envelope.
fn rejection_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
