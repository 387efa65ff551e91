use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::resolver::{CodeOwner, ShortCodeResolver};
use crate::services::storage::{StorageService, object_key};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

/// A hung object-store call must not pin a serving task indefinitely.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FileUpload {
    pub data: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
}

pub struct CreateFileParams {
    pub short_codes: Vec<String>,
    pub domain_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: bool,
    pub is_public: bool,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct UpdateFileParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: Option<bool>,
    pub is_public: Option<bool>,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct FileService;

impl FileService {
    /// Hash a file password using argon2, the same scheme as user passwords.
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    /// Store the bytes, then the record, then the codes. If the record
    /// insert fails the stored object is removed again, best-effort.
    pub async fn create_file(
        db: &DatabaseConnection,
        storage: &Arc<dyn StorageService>,
        bucket: &str,
        user_id: &str,
        upload: FileUpload,
        params: CreateFileParams,
    ) -> Result<(files::Model, Vec<short_codes::Model>), AppError> {
        let codes = if params.short_codes.is_empty() {
            vec![ShortCodeResolver::generate_file_code()]
        } else {
            params.short_codes
        };

        // Must fail before any row is written
        ShortCodeResolver::assert_codes_available(db, &codes).await?;

        let password_hash = match params.password.as_deref() {
            Some(password) if !password.is_empty() => Some(Self::hash_password(password)?),
            _ => None,
        };

        let file_size = upload.data.len() as i64;
        let s3_key = object_key(&upload.original_name);

        timeout(
            UPLOAD_TIMEOUT,
            storage.upload(&s3_key, upload.data, &upload.mime_type),
        )
        .await
        .map_err(|_| AppError::Internal("Object store upload timed out".to_string()))?
        .map_err(|e| AppError::Internal(format!("Object store upload failed: {}", e)))?;

        let now = Utc::now();
        let file = files::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            domain_id: Set(params.domain_id),
            filename: Set(storage_filename(&upload.original_name)),
            original_name: Set(upload.original_name),
            mime_type: Set(upload.mime_type),
            file_size: Set(file_size),
            s3_key: Set(s3_key.clone()),
            s3_bucket: Set(bucket.to_string()),
            title: Set(params.title),
            description: Set(params.description),
            downloads: Set(0),
            analytics: Set(params.analytics),
            is_public: Set(params.is_public),
            password_hash: Set(password_hash),
            expires_at: Set(params.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let file = match file.insert(db).await {
            Ok(file) => file,
            Err(e) => {
                // The object is orphaned otherwise; failure here only logs.
                Self::delete_object(storage, &s3_key).await;
                return Err(e.into());
            }
        };

        let codes = ShortCodeResolver::attach_codes(db, CodeOwner::File(&file.id), &codes).await?;

        Ok((file, codes))
    }

    pub async fn get_file(
        db: &DatabaseConnection,
        file_id: &str,
        user_id: &str,
    ) -> Result<(files::Model, Vec<short_codes::Model>), AppError> {
        let file = Files::find_by_id(file_id)
            .filter(files::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        let codes = ShortCodeResolver::codes_for_file(db, &file.id).await?;
        Ok((file, codes))
    }

    pub async fn list_files(
        db: &DatabaseConnection,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<(files::Model, Vec<short_codes::Model>)>, AppError> {
        let files = Files::find()
            .filter(files::Column::UserId.eq(user_id))
            .order_by_desc(files::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await?;

        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let codes = ShortCodeResolver::codes_for_file(db, &file.id).await?;
            result.push((file, codes));
        }

        Ok(result)
    }

    pub async fn update_file(
        db: &DatabaseConnection,
        file_id: &str,
        user_id: &str,
        params: UpdateFileParams,
    ) -> Result<files::Model, AppError> {
        let file = Files::find_by_id(file_id)
            .filter(files::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        let mut active: files::ActiveModel = file.into();
        if let Some(title) = params.title {
            active.title = Set(Some(title));
        }
        if let Some(description) = params.description {
            active.description = Set(Some(description));
        }
        if let Some(analytics) = params.analytics {
            active.analytics = Set(analytics);
        }
        if let Some(is_public) = params.is_public {
            active.is_public = Set(is_public);
        }
        if let Some(password) = params.password {
            if password.is_empty() {
                active.password_hash = Set(None);
            } else {
                active.password_hash = Set(Some(Self::hash_password(&password)?));
            }
        }
        if let Some(expires_at) = params.expires_at {
            active.expires_at = Set(Some(expires_at));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(updated)
    }

    /// The record goes first; the stored object is removed afterwards,
    /// best-effort, bounded to 10 seconds.
    pub async fn delete_file(
        db: &DatabaseConnection,
        storage: Option<&Arc<dyn StorageService>>,
        file_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let file = Files::find_by_id(file_id)
            .filter(files::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        let result = Files::delete_many()
            .filter(files::Column::Id.eq(file_id))
            .filter(files::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        if let Some(storage) = storage {
            Self::delete_object(storage, &file.s3_key).await;
        }

        Ok(())
    }

    /// Fetch the byte stream for an allowed download. An absent object store
    /// degrades to service-unavailable rather than a crash.
    pub async fn open_download(
        storage: Option<&Arc<dyn StorageService>>,
        file: &files::Model,
    ) -> Result<ByteStream, AppError> {
        let storage = storage.ok_or(AppError::ServiceUnavailable(
            "File download service is not available".to_string(),
        ))?;

        let stream = timeout(DOWNLOAD_TIMEOUT, storage.download(&file.s3_key))
            .await
            .map_err(|_| AppError::Internal("Object store download timed out".to_string()))?
            .map_err(|e| {
                tracing::error!(file_id = %file.id, "Failed to fetch object: {}", e);
                AppError::Internal("Failed to download file".to_string())
            })?;

        Ok(stream)
    }

    async fn delete_object(storage: &Arc<dyn StorageService>, key: &str) {
        match timeout(DELETE_TIMEOUT, storage.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(key, "Failed to delete object: {}", e),
            Err(_) => tracing::warn!(key, "Object delete timed out"),
        }
    }
}

/// Storage-facing name: random prefix plus the original, so user names can
/// repeat without colliding.
fn storage_filename(original: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    format!("{}_{}", hex::encode(bytes), original)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_filename_keeps_original_and_differs() {
        let a = storage_filename("doc.pdf");
        let b = storage_filename("doc.pdf");
        assert!(a.ends_with("_doc.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_password_verifies_with_access_policy() {
        let hash = FileService::hash_password("secret123").unwrap();
        assert!(crate::services::access::verify_password("secret123", &hash));
        assert!(!crate::services::access::verify_password("wrongpw", &hash));
    }
}
