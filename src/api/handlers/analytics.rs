use crate::api::error::AppError;
use crate::entities::{clicks, file_downloads};
use crate::services::analytics::{
    AnalyticsService, FileAnalyticsSummary, UserAnalytics, UserFileAnalytics,
};
use crate::services::credentials::Identity;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct LinkClicksResponse {
    pub link_id: String,
    pub total: usize,
    #[schema(value_type = Vec<Object>)]
    pub clicks: Vec<clicks::Model>,
}

#[derive(Serialize, ToSchema)]
pub struct FileDownloadsResponse {
    pub file_id: String,
    pub total: usize,
    #[schema(value_type = Vec<Object>)]
    pub downloads: Vec<file_downloads::Model>,
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/links/{id}",
    params(("id" = String, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Click events for the link", body = LinkClicksResponse),
        (status = 404, description = "Link not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_link_analytics(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(link_id): Path<String>,
) -> Result<Json<LinkClicksResponse>, AppError> {
    let clicks = AnalyticsService::link_clicks(&state.db, &link_id, &identity.user_id).await?;

    Ok(Json(LinkClicksResponse {
        link_id,
        total: clicks.len(),
        clicks,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/user",
    responses(
        (status = 200, description = "Aggregate click analytics for the caller", body = UserAnalytics),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_user_analytics(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserAnalytics>, AppError> {
    let overview = AnalyticsService::user_overview(&state.db, &identity.user_id).await?;
    Ok(Json(overview))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/analytics",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "Download events for the file", body = FileDownloadsResponse),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_file_analytics(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
) -> Result<Json<FileDownloadsResponse>, AppError> {
    let downloads =
        AnalyticsService::file_downloads(&state.db, &file_id, &identity.user_id).await?;

    Ok(Json(FileDownloadsResponse {
        file_id,
        total: downloads.len(),
        downloads,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/files",
    responses(
        (status = 200, description = "Aggregate file analytics for the caller", body = UserFileAnalytics),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn get_user_file_analytics(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserFileAnalytics>, AppError> {
    let overview = AnalyticsService::user_file_overview(&state.db, &identity.user_id).await?;
    Ok(Json(overview))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/files/{id}/summary",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "Windowed download summary", body = FileAnalyticsSummary),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_file_analytics_summary(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
) -> Result<Json<FileAnalyticsSummary>, AppError> {
    let summary = AnalyticsService::file_summary(&state.db, &file_id, &identity.user_id).await?;
    Ok(Json(summary))
}
