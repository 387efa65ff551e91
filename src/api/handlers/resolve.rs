use crate::api::error::AppError;
use crate::entities::files;
use crate::services::access::{self, AccessDecision, DenyReason};
use crate::services::analytics::AnalyticsService;
use crate::services::file_service::FileService;
use crate::services::resolver::{ResolvedResource, ShortCodeResolver};
use crate::utils::request::RequestMeta;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub password: Option<String>,
    pub info: Option<bool>,
}

/// The public entry point for every short code, link or file alike:
/// resolve, evaluate access, then serve. Counters and analytics events are
/// recorded only on the Allow branch and never fail the response.
#[utoipa::path(
    get,
    path = "/{prefix}/{code}",
    params(
        ("prefix" = String, Path, description = "Configured public prefix"),
        ("code" = String, Path, description = "Short code"),
        ("password" = Option<String>, Query, description = "Password for protected files"),
        ("info" = Option<bool>, Query, description = "Return file metadata instead of bytes")
    ),
    responses(
        (status = 302, description = "Redirect to the original URL"),
        (status = 200, description = "File bytes or metadata"),
        (status = 401, description = "Password required or wrong"),
        (status = 403, description = "File is private"),
        (status = 404, description = "Unknown short code"),
        (status = 410, description = "Resource has expired"),
        (status = 503, description = "Object store not configured")
    )
)]
pub async fn resolve_short_code(
    State(state): State<crate::AppState>,
    Path(code): Path<String>,
    Query(query): Query<ResolveQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let resource = ShortCodeResolver::resolve(&state.db, &code)
        .await?
        .ok_or(AppError::NotFound("Short code not found".to_string()))?;

    // An empty password query counts as absent, so browsers submitting blank
    // forms get the challenge again instead of a denial.
    let password = query.password.as_deref().filter(|p| !p.is_empty());

    match access::evaluate(&resource, Utc::now(), password) {
        AccessDecision::Allow => {}
        AccessDecision::ChallengePassword => return Err(AppError::PasswordRequired),
        AccessDecision::Deny(DenyReason::Expired) => {
            let what = match resource {
                ResolvedResource::Link(_) => "Link has expired",
                ResolvedResource::File(_) => "File has expired",
            };
            return Err(AppError::Gone(what.to_string()));
        }
        AccessDecision::Deny(DenyReason::PrivateNoPassword) => {
            return Err(AppError::Forbidden("File is private".to_string()));
        }
        AccessDecision::Deny(DenyReason::BadPassword) => {
            return Err(AppError::Unauthorized("Invalid password".to_string()));
        }
    }

    let meta = RequestMeta::from_headers(&headers);
    match resource {
        ResolvedResource::Link(link) => {
            AnalyticsService::increment_clicks(&state.db, &link.id).await;
            if state.config.analytics && link.analytics {
                AnalyticsService::record_click(&state.db, &link.id, &meta).await;
            }

            Response::builder()
                .status(StatusCode::FOUND)
                .header(header::LOCATION, &link.original_url)
                .body(Body::empty())
                .map_err(|e| AppError::Internal(format!("Failed to build redirect: {}", e)))
        }
        ResolvedResource::File(file) => {
            if query.info.unwrap_or(false) {
                return Ok(file_info(&file).into_response());
            }

            AnalyticsService::increment_downloads(&state.db, &file.id).await;
            if state.config.analytics && file.analytics {
                AnalyticsService::record_download(&state.db, &file.id, &meta).await;
            }

            serve_file(&state, file).await
        }
    }
}

/// Metadata answer for `?info=true`; does not count as a download.
fn file_info(file: &files::Model) -> Json<serde_json::Value> {
    Json(json!({
        "id": file.id,
        "filename": file.filename,
        "original_name": file.original_name,
        "mime_type": file.mime_type,
        "file_size": file.file_size,
        "title": file.title,
        "description": file.description,
        "downloads": file.downloads,
        "created_at": file.created_at,
    }))
}

async fn serve_file(state: &crate::AppState, file: files::Model) -> Result<Response, AppError> {
    let stream = FileService::open_download(state.storage.as_ref(), &file).await?;

    let ascii_filename = file
        .original_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file".to_string()
    } else {
        ascii_filename
    };
    let encoded_filename = utf8_percent_encode(&file.original_name, NON_ALPHANUMERIC).to_string();
    let content_disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    );

    let body = Body::from_stream(ReaderStream::new(stream.into_async_read()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type)
        .header(header::CONTENT_LENGTH, file.file_size.to_string())
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
