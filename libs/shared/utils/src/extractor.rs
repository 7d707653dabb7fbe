use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::Session;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stashes an explicit [`Session`] in the
/// request extensions. Collaborator clients receive the session as an
/// argument; nothing reads auth state from ambient storage.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.clinic_jwt_secret).map_err(AppError::Auth)?;

    // Build the session before touching extensions; `token` still borrows
    // from the header map.
    let session = Session::new(user, token);
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
