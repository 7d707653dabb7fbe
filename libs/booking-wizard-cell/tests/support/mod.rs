// libs/booking-wizard-cell/tests/support/mod.rs
#![allow(dead_code)]

use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_wizard_cell::{NotificationSink, WizardNotification};
use shared_config::AppConfig;
use shared_models::auth::Session;
use shared_utils::test_utils::{MockClinicResponses, TestConfig, TestUser};

/// Sink that records every emitted notification for later assertions.
pub struct RecordingSink {
    events: Mutex<Vec<WizardNotification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<WizardNotification> {
        self.events.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: WizardNotification) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn test_config(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.clinic_api_url = mock_server.uri();
    config
}

pub fn patient_session(user: &TestUser) -> Session {
    user.to_session("test-bearer-token")
}

pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

pub async fn mount_doctor(
    mock_server: &MockServer,
    doctor_id: &Uuid,
    branches: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/doctors/{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockClinicResponses::doctor_response(
                &doctor_id.to_string(),
                "Aoife",
                "Byrne",
                "General Practice",
                branches,
            ),
        ))
        .mount(mock_server)
        .await;
}

pub async fn mount_profile(mock_server: &MockServer, patient_id: &Uuid) {
    Mock::given(method("GET"))
        .and(path("/api/v1/patients/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockClinicResponses::patient_profile_response(&patient_id.to_string(), "Test", "Patient"),
        ))
        .mount(mock_server)
        .await;
}

pub async fn mount_family(
    mock_server: &MockServer,
    patient_id: &Uuid,
    members: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/patients/{}/family-members", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(members))
        .mount(mock_server)
        .await;
}

pub async fn mount_clinic_link(mock_server: &MockServer, doctor_id: &Uuid, branch_id: &Uuid) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/doctors/{}/clinics/{}",
            doctor_id, branch_id
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockClinicResponses::clinic_link_response(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &branch_id.to_string(),
                60.0,
            ),
        ))
        .mount(mock_server)
        .await;
}

pub async fn mount_slots(
    mock_server: &MockServer,
    doctor_id: &Uuid,
    branch_id: &Uuid,
    date: &str,
    slots: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v1/doctors/{}/branches/{}/slots",
            doctor_id, branch_id
        )))
        .and(query_param("date", date))
        .respond_with(ResponseTemplate::new(200).set_body_json(slots))
        .mount(mock_server)
        .await;
}

/// Mounts the three fetches every wizard open performs: the doctor with one
/// branch, the signed-in patient's profile and an empty family roster.
pub async fn setup_entry_mocks(
    mock_server: &MockServer,
    doctor_id: &Uuid,
    branch_id: &Uuid,
    patient_id: &Uuid,
) {
    mount_doctor(
        mock_server,
        doctor_id,
        json!([MockClinicResponses::branch_response(
            &branch_id.to_string(),
            "Dublin Clinic",
            false
        )]),
    )
    .await;
    mount_profile(mock_server, patient_id).await;
    mount_family(mock_server, patient_id, json!([])).await;
}
