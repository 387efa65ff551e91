use crate::api::error::AppError;
use crate::services::credentials::CredentialService;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

/// Authorization header first, `?token=` query parameter second (download
/// links opened from a browser cannot set headers).
fn bearer_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    from_header.or_else(|| {
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    })
}

/// Session tokens only. Used by endpoints that manage credentials and other
/// account-level state.
pub async fn session_auth(
    State(state): State<crate::AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized("Authorization required".to_string()))?;

    let identity = CredentialService::validate_session(&state.db, &state.config.jwt_secret, &token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Session token or API key, tried in that order. The response does not
/// reveal which step failed.
pub async fn session_or_api_key_auth(
    State(state): State<crate::AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized("Authorization required".to_string()))?;

    let identity = CredentialService::validate(&state.db, &state.config.jwt_secret, &token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
