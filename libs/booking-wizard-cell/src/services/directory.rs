// libs/booking-wizard-cell/src/services/directory.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::WizardError;
use crate::models::{DoctorClinic, DoctorWithBranches, FetchCategory};

/// Reads the clinic directory: which branches a doctor practices at and the
/// doctor/branch link record carrying the consultation fee.
pub struct ClinicDirectoryClient {
    api: Arc<ClinicApiClient>,
}

impl ClinicDirectoryClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ClinicApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    /// Fetches the doctor's profile together with the branches they
    /// practice at.
    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        session: &Session,
    ) -> Result<DoctorWithBranches, WizardError> {
        debug!("Fetching doctor {} with branches", doctor_id);

        self.api
            .request(
                Method::GET,
                &format!("/api/v1/doctors/{}", doctor_id),
                Some(session),
                None,
            )
            .await
            .map_err(|e| WizardError::fetch(FetchCategory::BranchDirectory, e))
    }

    /// Fetches the doctor/branch link record for a selected branch. The fee
    /// shown on the review step comes from here.
    pub async fn get_clinic_link(
        &self,
        doctor_id: Uuid,
        branch_id: Uuid,
        session: &Session,
    ) -> Result<DoctorClinic, WizardError> {
        debug!("Fetching clinic link for doctor {} at branch {}", doctor_id, branch_id);

        self.api
            .request(
                Method::GET,
                &format!("/api/v1/doctors/{}/clinics/{}", doctor_id, branch_id),
                Some(session),
                None,
            )
            .await
            .map_err(|e| WizardError::fetch(FetchCategory::ClinicLink, e))
    }
}
