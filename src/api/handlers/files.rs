use crate::api::error::AppError;
use crate::api::handlers::links::{ShortCodeInfo, code_info};
use crate::entities::{files, short_codes};
use crate::services::credentials::Identity;
use crate::services::file_service::{
    CreateFileParams, FileService, FileUpload, UpdateFileParams,
};
use crate::utils::validation::{validate_file_size, validate_mime_type, validate_password};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct UpdateFileRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: Option<bool>,
    pub is_public: Option<bool>,
    /// New password; empty string removes the password
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub downloads: i64,
    pub analytics: bool,
    pub is_public: bool,
    pub has_password: bool,
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

fn to_response(file: files::Model, codes: Vec<short_codes::Model>) -> FileResponse {
    FileResponse {
        id: file.id,
        filename: file.filename,
        original_name: file.original_name,
        mime_type: file.mime_type,
        file_size: file.file_size,
        title: file.title,
        description: file.description,
        downloads: file.downloads,
        analytics: file.analytics,
        is_public: file.is_public,
        has_password: file.password_hash.is_some(),
        expires_at: file.expires_at,
        created_at: file.created_at,
        updated_at: file.updated_at,
        short_codes: code_info(codes),
    }
}

/// Multipart fields other than `file` arrive as text; bad values are caller
/// errors, not ours.
struct UploadForm {
    upload: Option<FileUpload>,
    params: CreateFileParams,
}

async fn parse_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        upload: None,
        params: CreateFileParams {
            short_codes: Vec::new(),
            domain_id: None,
            title: None,
            description: None,
            analytics: false,
            is_public: true, // Default to public
            password: None,
            expires_at: None,
        },
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to parse multipart form: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let original_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload")
                    .to_string();
                let mime_type = field
                    .content_type()
                    .filter(|c| !c.is_empty())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?
                    .to_vec();
                form.upload = Some(FileUpload {
                    data,
                    original_name,
                    mime_type,
                });
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {}", e)))?;
                match other {
                    "short_codes" if !value.is_empty() => form.params.short_codes.push(value),
                    "title" if !value.is_empty() => form.params.title = Some(value),
                    "description" if !value.is_empty() => form.params.description = Some(value),
                    "domain_id" if !value.is_empty() => form.params.domain_id = Some(value),
                    "analytics" => form.params.analytics = value == "true",
                    "is_public" => form.params.is_public = value != "false",
                    "password" if !value.is_empty() => form.params.password = Some(value),
                    "expires_at" if !value.is_empty() => {
                        let parsed = DateTime::parse_from_rfc3339(&value).map_err(|_| {
                            AppError::BadRequest(
                                "expires_at must be an RFC 3339 timestamp".to_string(),
                            )
                        })?;
                        form.params.expires_at = Some(parsed.with_timezone(&Utc));
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/api/v1/files",
    responses(
        (status = 201, description = "File uploaded", body = FileResponse),
        (status = 400, description = "Invalid upload"),
        (status = 409, description = "Short code already taken"),
        (status = 429, description = "Too many uploads"),
        (status = 503, description = "Object store not configured")
    ),
    security(("bearer" = []))
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let storage = state.storage.as_ref().ok_or(AppError::ServiceUnavailable(
        "File upload service is not enabled".to_string(),
    ))?;

    let form = parse_upload_form(multipart).await?;
    let upload = form
        .upload
        .ok_or(AppError::BadRequest("No file provided".to_string()))?;
    let params = form.params;

    validate_file_size(upload.data.len(), state.config.max_file_size)
        .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;
    validate_mime_type(&upload.mime_type, &state.config.allowed_mime_types)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if let Some(ref password) = params.password {
        validate_password(password).map_err(|e| AppError::BadRequest(e.to_string()))?;
    }
    if params.title.as_deref().is_some_and(|t| t.len() > 255) {
        return Err(AppError::BadRequest(
            "Title must be less than 255 characters".to_string(),
        ));
    }
    if params.description.as_deref().is_some_and(|d| d.len() > 1000) {
        return Err(AppError::BadRequest(
            "Description must be less than 1000 characters".to_string(),
        ));
    }

    let (file, codes) = FileService::create_file(
        &state.db,
        storage,
        &state.config.s3.bucket,
        &identity.user_id,
        upload,
        params,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(to_response(file, codes))))
}

#[utoipa::path(
    get,
    path = "/api/v1/files",
    params(
        ("limit" = Option<u64>, Query, description = "Page size (default 20)"),
        ("offset" = Option<u64>, Query, description = "Page offset")
    ),
    responses(
        (status = 200, description = "The caller's files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FileResponse>>, AppError> {
    let limit = query.limit.unwrap_or(20).min(100);
    let offset = query.offset.unwrap_or(0);

    let files = FileService::list_files(&state.db, &identity.user_id, limit, offset).await?;
    let result = files
        .into_iter()
        .map(|(file, codes)| to_response(file, codes))
        .collect();

    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 200, description = "File details", body = FileResponse),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_file(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let (file, codes) = FileService::get_file(&state.db, &file_id, &identity.user_id).await?;
    Ok(Json(to_response(file, codes)))
}

#[utoipa::path(
    put,
    path = "/api/v1/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "File updated", body = FileResponse),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_file(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<FileResponse>, AppError> {
    if let Some(ref password) = req.password {
        if !password.is_empty() {
            validate_password(password).map_err(|e| AppError::BadRequest(e.to_string()))?;
        }
    }

    let file = FileService::update_file(
        &state.db,
        &file_id,
        &identity.user_id,
        UpdateFileParams {
            title: req.title,
            description: req.description,
            analytics: req.analytics,
            is_public: req.is_public,
            password: req.password,
            expires_at: req.expires_at,
        },
    )
    .await?;

    let codes =
        crate::services::resolver::ShortCodeResolver::codes_for_file(&state.db, &file.id).await?;
    Ok(Json(to_response(file, codes)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    params(("id" = String, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, AppError> {
    FileService::delete_file(
        &state.db,
        state.storage.as_ref(),
        &file_id,
        &identity.user_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
