use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::auth::Session;

#[derive(Error, Debug)]
pub enum ClinicApiError {
    #[error("clinic API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request to clinic API failed: {0}")]
    Transport(reqwest::Error),

    #[error("failed to decode clinic API response: {0}")]
    Decode(reqwest::Error),
}

impl ClinicApiError {
    /// True when retrying the same request may succeed (network trouble or
    /// a server-side 5xx), as opposed to a semantic rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            ClinicApiError::Transport(_) => true,
            ClinicApiError::Status { status, .. } => status.is_server_error(),
            ClinicApiError::Decode(_) => false,
        }
    }
}

pub struct ClinicApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ClinicApiClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.clinic_api_url.clone(),
            api_key: config.clinic_api_key.clone(),
        }
    }

    fn get_headers(&self, session: Option<&Session>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(session) = session {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", session.bearer())) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Option<Value>,
    ) -> Result<T, ClinicApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(session);

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(ClinicApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Clinic API error ({}): {}", status, body);
            return Err(ClinicApiError::Status { status, body });
        }

        response.json::<T>().await.map_err(ClinicApiError::Decode)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
