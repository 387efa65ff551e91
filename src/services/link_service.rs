use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::resolver::{CodeOwner, ShortCodeResolver};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

pub struct CreateLinkParams {
    pub original_url: String,
    pub short_codes: Vec<String>,
    pub domain_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct UpdateLinkParams {
    pub original_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub analytics: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct LinkService;

impl LinkService {
    pub async fn create_link(
        db: &DatabaseConnection,
        user_id: &str,
        params: CreateLinkParams,
    ) -> Result<(links::Model, Vec<short_codes::Model>), AppError> {
        if !params.original_url.starts_with("http://") && !params.original_url.starts_with("https://")
        {
            return Err(AppError::BadRequest(
                "original_url must be an http(s) URL".to_string(),
            ));
        }

        let codes = if params.short_codes.is_empty() {
            vec![ShortCodeResolver::generate_link_code()]
        } else {
            params.short_codes
        };

        // Must fail before any row is written
        ShortCodeResolver::assert_codes_available(db, &codes).await?;

        let now = Utc::now();
        let link = links::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            domain_id: Set(params.domain_id),
            original_url: Set(params.original_url),
            title: Set(params.title),
            description: Set(params.description),
            clicks: Set(0),
            analytics: Set(params.analytics),
            expires_at: Set(params.expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let link = link.insert(db).await?;

        let codes = ShortCodeResolver::attach_codes(db, CodeOwner::Link(&link.id), &codes).await?;

        Ok((link, codes))
    }

    pub async fn get_link(
        db: &DatabaseConnection,
        link_id: &str,
        user_id: &str,
    ) -> Result<(links::Model, Vec<short_codes::Model>), AppError> {
        let link = Links::find_by_id(link_id)
            .filter(links::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))?;

        let codes = ShortCodeResolver::codes_for_link(db, &link.id).await?;
        Ok((link, codes))
    }

    pub async fn list_links(
        db: &DatabaseConnection,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<(links::Model, Vec<short_codes::Model>)>, AppError> {
        let links = Links::find()
            .filter(links::Column::UserId.eq(user_id))
            .order_by_desc(links::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(db)
            .await?;

        let mut result = Vec::with_capacity(links.len());
        for link in links {
            let codes = ShortCodeResolver::codes_for_link(db, &link.id).await?;
            result.push((link, codes));
        }

        Ok(result)
    }

    pub async fn update_link(
        db: &DatabaseConnection,
        link_id: &str,
        user_id: &str,
        params: UpdateLinkParams,
    ) -> Result<links::Model, AppError> {
        let link = Links::find_by_id(link_id)
            .filter(links::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))?;

        let mut active: links::ActiveModel = link.into();
        if let Some(original_url) = params.original_url {
            if !original_url.starts_with("http://") && !original_url.starts_with("https://") {
                return Err(AppError::BadRequest(
                    "original_url must be an http(s) URL".to_string(),
                ));
            }
            active.original_url = Set(original_url);
        }
        if let Some(title) = params.title {
            active.title = Set(Some(title));
        }
        if let Some(description) = params.description {
            active.description = Set(Some(description));
        }
        if let Some(analytics) = params.analytics {
            active.analytics = Set(analytics);
        }
        if let Some(expires_at) = params.expires_at {
            active.expires_at = Set(Some(expires_at));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(updated)
    }

    /// Codes and click rows go with the link via the store's cascades.
    pub async fn delete_link(
        db: &DatabaseConnection,
        link_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let result = Links::delete_many()
            .filter(links::Column::Id.eq(link_id))
            .filter(links::Column::UserId.eq(user_id))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Link not found".to_string()));
        }
        Ok(())
    }
}
