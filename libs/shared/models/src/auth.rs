use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Authenticated caller context, carried explicitly into every clinic API
/// call rather than read from ambient storage.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    bearer: String,
}

impl Session {
    pub fn new(user: User, bearer: impl Into<String>) -> Self {
        Self {
            user,
            bearer: bearer.into(),
        }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}
