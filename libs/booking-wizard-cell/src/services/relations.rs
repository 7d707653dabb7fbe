// libs/booking-wizard-cell/src/services/relations.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::error::WizardError;
use crate::models::{FamilyMember, FetchCategory, PatientProfile};

/// Reads the booking patient's own profile and the family members an
/// appointment may be booked for.
pub struct PatientRelationsClient {
    api: Arc<ClinicApiClient>,
}

impl PatientRelationsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ClinicApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    /// Fetches the profile of the authenticated patient.
    pub async fn get_my_profile(&self, session: &Session) -> Result<PatientProfile, WizardError> {
        debug!("Fetching patient profile for user {}", session.user_id());

        self.api
            .request(Method::GET, "/api/v1/patients/me", Some(session), None)
            .await
            .map_err(|e| WizardError::fetch(FetchCategory::PatientProfile, e))
    }

    /// Lists the family members registered on a patient profile.
    pub async fn list_family_members(
        &self,
        patient_id: Uuid,
        session: &Session,
    ) -> Result<Vec<FamilyMember>, WizardError> {
        debug!("Fetching family members for patient {}", patient_id);

        self.api
            .request(
                Method::GET,
                &format!("/api/v1/patients/{}/family-members", patient_id),
                Some(session),
                None,
            )
            .await
            .map_err(|e| WizardError::fetch(FetchCategory::FamilyMembers, e))
    }
}
