use crate::api::error::AppError;
use crate::entities::{links, short_codes};
use crate::services::credentials::Identity;
use crate::services::link_service::{CreateLinkParams, LinkService, UpdateLinkParams};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLinkRequest {
    pub original_url: String,
    pub short_codes: Option<Vec<String>>,
    pub domain_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub analytics: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLinkRequest {
    pub original_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ShortCodeInfo {
    pub short_code: String,
    pub is_primary: bool,
}

#[derive(Serialize, ToSchema)]
pub struct LinkResponse {
    pub id: String,
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub clicks: i64,
    pub analytics: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub short_codes: Vec<ShortCodeInfo>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub(crate) fn code_info(codes: Vec<short_codes::Model>) -> Vec<ShortCodeInfo> {
    codes
        .into_iter()
        .map(|c| ShortCodeInfo {
            short_code: c.short_code,
            is_primary: c.is_primary,
        })
        .collect()
}

fn to_response(link: links::Model, codes: Vec<short_codes::Model>) -> LinkResponse {
    LinkResponse {
        id: link.id,
        original_url: link.original_url,
        title: link.title,
        description: link.description,
        clicks: link.clicks,
        analytics: link.analytics,
        expires_at: link.expires_at,
        created_at: link.created_at,
        updated_at: link.updated_at,
        short_codes: code_info(codes),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/links",
    request_body = CreateLinkRequest,
    responses(
        (status = 201, description = "Link created", body = LinkResponse),
        (status = 400, description = "Invalid URL or short code"),
        (status = 409, description = "Short code already taken")
    ),
    security(("bearer" = []))
)]
pub async fn create_link(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    let (link, codes) = LinkService::create_link(
        &state.db,
        &identity.user_id,
        CreateLinkParams {
            original_url: req.original_url,
            short_codes: req.short_codes.unwrap_or_default(),
            domain_id: req.domain_id,
            title: req.title,
            description: req.description,
            analytics: req.analytics,
            expires_at: req.expires_at,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(link, codes))))
}

#[utoipa::path(
    get,
    path = "/api/v1/links",
    params(
        ("limit" = Option<u64>, Query, description = "Page size (default 20)"),
        ("offset" = Option<u64>, Query, description = "Page offset")
    ),
    responses(
        (status = 200, description = "The caller's links", body = Vec<LinkResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn list_links(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LinkResponse>>, AppError> {
    let limit = query.limit.unwrap_or(20).min(100);
    let offset = query.offset.unwrap_or(0);

    let links = LinkService::list_links(&state.db, &identity.user_id, limit, offset).await?;
    let result = links
        .into_iter()
        .map(|(link, codes)| to_response(link, codes))
        .collect();

    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/v1/links/{id}",
    params(("id" = String, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Link details", body = LinkResponse),
        (status = 404, description = "Link not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_link(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(link_id): Path<String>,
) -> Result<Json<LinkResponse>, AppError> {
    let (link, codes) = LinkService::get_link(&state.db, &link_id, &identity.user_id).await?;
    Ok(Json(to_response(link, codes)))
}

#[utoipa::path(
    put,
    path = "/api/v1/links/{id}",
    params(("id" = String, Path, description = "Link ID")),
    request_body = UpdateLinkRequest,
    responses(
        (status = 200, description = "Link updated", body = LinkResponse),
        (status = 404, description = "Link not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_link(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(link_id): Path<String>,
    Json(req): Json<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    let link = LinkService::update_link(
        &state.db,
        &link_id,
        &identity.user_id,
        UpdateLinkParams {
            original_url: req.original_url,
            title: req.title,
            description: req.description,
            analytics: req.analytics,
            expires_at: req.expires_at,
        },
    )
    .await?;

    let codes = crate::services::resolver::ShortCodeResolver::codes_for_link(&state.db, &link.id)
        .await?;
    Ok(Json(to_response(link, codes)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/links/{id}",
    params(("id" = String, Path, description = "Link ID")),
    responses(
        (status = 204, description = "Link deleted"),
        (status = 404, description = "Link not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_link(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(link_id): Path<String>,
) -> Result<StatusCode, AppError> {
    LinkService::delete_link(&state.db, &link_id, &identity.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
