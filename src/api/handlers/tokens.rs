use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::credentials::{Identity, generate_api_key, hash_api_key};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateApiKeyResponse {
    /// The plaintext key. Shown exactly once; only its hash is stored.
    pub token: String,
    pub api_key: ApiKeyResponse,
}

impl From<api_keys::Model> for ApiKeyResponse {
    fn from(key: api_keys::Model) -> Self {
        Self {
            id: key.id,
            name: key.name,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            created_at: key.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/tokens",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key created", body = CreateApiKeyResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn create_api_key(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), AppError> {
    let token = generate_api_key();

    let key = api_keys::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(identity.user_id),
        key_hash: Set(hash_api_key(&token)),
        name: Set(req.name),
        last_used_at: Set(None),
        expires_at: Set(req.expires_at),
        created_at: Set(Utc::now()),
    };
    let key = key.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            token,
            api_key: key.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/tokens",
    responses(
        (status = 200, description = "The caller's API keys", body = Vec<ApiKeyResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer" = []))
)]
pub async fn list_api_keys(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = ApiKeys::find()
        .filter(api_keys::Column::UserId.eq(identity.user_id))
        .order_by_desc(api_keys::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tokens/{id}",
    params(("id" = String, Path, description = "API key ID")),
    responses(
        (status = 204, description = "API key revoked"),
        (status = 404, description = "API key not found")
    ),
    security(("bearer" = []))
)]
pub async fn revoke_api_key(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(key_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let result = ApiKeys::delete_many()
        .filter(api_keys::Column::Id.eq(key_id))
        .filter(api_keys::Column::UserId.eq(identity.user_id))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("API key not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
