use crate::api::error::AppError;
use crate::services::rate_limit::Admission;
use crate::utils::request::client_ip;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};

/// Admission gate for file uploads, keyed by client IP. Clients behind the
/// same proxy without forwarding headers share the fallback key.
pub async fn upload_rate_limit(
    State(state): State<crate::AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_key = client_ip(req.headers()).unwrap_or_else(|| "unknown".to_string());
    let window = Duration::seconds(state.config.upload_rate_window_secs as i64);

    match state.rate_limiter.admit(
        &client_key,
        state.config.upload_rate_limit,
        window,
        Utc::now(),
    ) {
        Admission::Admit => Ok(next.run(req).await),
        Admission::Reject => {
            tracing::debug!(%client_key, "Upload rejected by rate limiter");
            Err(AppError::RateLimited)
        }
    }
}
