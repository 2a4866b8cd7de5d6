use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Verifies the bearer token and stores the caller as an `Extension<User>`.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Fails with 403 unless the caller holds one of `roles`.
pub fn require_role(user: &User, roles: &[&str]) -> Result<(), AppError> {
    match user.role.as_deref() {
        Some(role) if roles.contains(&role) => Ok(()),
        other => {
            debug!("User {} with role {:?} denied, needs one of {:?}", user.id, other, roles);
            Err(AppError::Forbidden(format!("Requires role: {}", roles.join(" or "))))
        }
    }
}

/// The caller's email, which links the token to a doctor or patient record.
pub fn require_email(user: &User) -> Result<&str, AppError> {
    user.email
        .as_deref()
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::Auth("Token carries no email".to_string()))
}
