use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Session, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub clinic_api_url: String,
    pub clinic_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            clinic_api_url: "http://localhost:4010".to_string(),
            clinic_api_key: "test-api-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            clinic_api_url: self.clinic_api_url.clone(),
            clinic_api_key: self.clinic_api_key.clone(),
            clinic_jwt_secret: self.jwt_secret.clone(),
            fetch_timeout_secs: 5,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_session(&self, bearer: &str) -> Session {
        Session::new(self.to_user(), bearer)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned clinic API payloads for wiremock-backed tests. Field names must
/// stay in sync with the wire models in booking-wizard-cell.
pub struct MockClinicResponses;

impl MockClinicResponses {
    pub fn branch_response(branch_id: &str, name: &str, is_virtual: bool) -> serde_json::Value {
        json!({
            "id": branch_id,
            "name": name,
            "address": format!("{} Main Street", name),
            "is_virtual": is_virtual
        })
    }

    pub fn doctor_response(
        doctor_id: &str,
        first_name: &str,
        last_name: &str,
        specialty: &str,
        branches: serde_json::Value,
    ) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": first_name,
            "last_name": last_name,
            "specialty": specialty,
            "avatar_url": null,
            "branches": branches
        })
    }

    pub fn clinic_link_response(
        link_id: &str,
        doctor_id: &str,
        branch_id: &str,
        consultation_fee: f64,
    ) -> serde_json::Value {
        json!({
            "id": link_id,
            "doctor_id": doctor_id,
            "branch_id": branch_id,
            "consultation_fee": consultation_fee,
            "currency": "EUR"
        })
    }

    pub fn slot_response(
        slot_id: &str,
        date: &str,
        start_hour: u32,
        available_slots: u32,
    ) -> serde_json::Value {
        json!({
            "id": slot_id,
            "doctor_id": null,
            "branch_id": null,
            "date": date,
            "start_time": format!("{}T{:02}:00:00Z", date, start_hour),
            "end_time": format!("{}T{:02}:30:00Z", date, start_hour),
            "duration_minutes": 30,
            "slot_type": "consultation",
            "status": "open",
            "available_slots": available_slots
        })
    }

    pub fn patient_profile_response(
        patient_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": first_name,
            "last_name": last_name,
            "email": "patient@example.com",
            "phone": "+353100200300"
        })
    }

    pub fn family_member_response(
        member_id: &str,
        first_name: &str,
        last_name: &str,
        relationship: &str,
    ) -> serde_json::Value {
        json!({
            "id": member_id,
            "first_name": first_name,
            "last_name": last_name,
            "relationship": relationship
        })
    }

    pub fn appointment_response(appointment_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "status": status
        })
    }

    pub fn doctor_summary_response(
        doctor_id: &str,
        first_name: &str,
        last_name: &str,
        specialty: &str,
    ) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "first_name": first_name,
            "last_name": last_name,
            "specialty": specialty,
            "avatar_url": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_token;
    use assert_matches::assert_matches;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.clinic_api_url, "http://localhost:4010");
        assert_eq!(app_config.clinic_api_key, "test-api-key");
        assert!(!app_config.clinic_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_jwt_token_round_trip() {
        let user = TestUser::patient("roundtrip@example.com");
        let secret = "test-secret";

        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));
        let validated = validate_token(&token, secret).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.email, Some(user.email.clone()));

        let expired = JwtTestUtils::create_expired_token(&user, secret);
        assert_matches!(validate_token(&expired, secret), Err(_));

        let forged = JwtTestUtils::create_invalid_signature_token(&user);
        assert_matches!(validate_token(&forged, secret), Err(_));
    }
}
