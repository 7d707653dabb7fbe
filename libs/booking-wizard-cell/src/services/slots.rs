// libs/booking-wizard-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::WizardError;
use crate::models::{FetchCategory, Slot};

/// Reads bookable time slots for a doctor at a branch on a given day.
pub struct SlotAvailabilityClient {
    api: Arc<ClinicApiClient>,
}

impl SlotAvailabilityClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ClinicApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    /// Lists the slots for one doctor/branch/date combination. The clinic
    /// platform already filters out past times; ordering is by start time.
    pub async fn list_slots(
        &self,
        doctor_id: Uuid,
        branch_id: Uuid,
        date: NaiveDate,
        session: &Session,
    ) -> Result<Vec<Slot>, WizardError> {
        debug!(
            "Fetching slots for doctor {} at branch {} on {}",
            doctor_id, branch_id, date
        );

        self.api
            .request(
                Method::GET,
                &format!(
                    "/api/v1/doctors/{}/branches/{}/slots?date={}",
                    doctor_id,
                    branch_id,
                    date.format("%Y-%m-%d")
                ),
                Some(session),
                None,
            )
            .await
            .map_err(|e| WizardError::fetch(FetchCategory::SlotList, e))
    }
}
