use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::utils::validation::is_valid_short_code;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// A short code's owning resource, tagged by kind. Both kinds share one code
/// namespace, so resolution never needs to know which table to consult first.
#[derive(Debug, Clone)]
pub enum ResolvedResource {
    Link(links::Model),
    File(files::Model),
}

impl ResolvedResource {
    pub fn id(&self) -> &str {
        match self {
            ResolvedResource::Link(link) => &link.id,
            ResolvedResource::File(file) => &file.id,
        }
    }
}

/// Which resource a set of codes should be attached to.
pub enum CodeOwner<'a> {
    Link(&'a str),
    File(&'a str),
}

pub struct ShortCodeResolver;

impl ShortCodeResolver {
    /// Look up a short code across both namespaces. A missing or malformed
    /// code is a quiet `None`, not an error; strings that cannot be a valid
    /// code skip the lookup entirely.
    pub async fn resolve(
        db: &DatabaseConnection,
        code: &str,
    ) -> Result<Option<ResolvedResource>, AppError> {
        if !is_valid_short_code(code) {
            return Ok(None);
        }

        let Some(entry) = ShortCodes::find()
            .filter(short_codes::Column::ShortCode.eq(code))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        if let Some(link_id) = entry.link_id {
            let link = Links::find_by_id(link_id).one(db).await?;
            return Ok(link.map(ResolvedResource::Link));
        }

        if let Some(file_id) = entry.file_id {
            let file = Files::find_by_id(file_id).one(db).await?;
            return Ok(file.map(ResolvedResource::File));
        }

        Ok(None)
    }

    pub async fn is_code_available(db: &DatabaseConnection, code: &str) -> Result<bool, AppError> {
        let existing = ShortCodes::find()
            .filter(short_codes::Column::ShortCode.eq(code))
            .one(db)
            .await?;
        Ok(existing.is_none())
    }

    /// Creation-time gate: every requested code must be well-formed and free
    /// in both namespaces before any row is written. The unique index on
    /// `short_codes.short_code` backs the remaining race window.
    pub async fn assert_codes_available(
        db: &DatabaseConnection,
        codes: &[String],
    ) -> Result<(), AppError> {
        for code in codes {
            if !is_valid_short_code(code) {
                return Err(AppError::BadRequest(format!(
                    "Invalid short code '{}': must be 3-32 characters of letters, numbers, hyphens, and underscores",
                    code
                )));
            }
            if !Self::is_code_available(db, code).await? {
                return Err(AppError::Conflict(format!(
                    "Short code '{}' already exists",
                    code
                )));
            }
        }
        Ok(())
    }

    /// Attach codes to a resource; the first code becomes primary.
    pub async fn attach_codes(
        db: &DatabaseConnection,
        owner: CodeOwner<'_>,
        codes: &[String],
    ) -> Result<Vec<short_codes::Model>, AppError> {
        let (link_id, file_id) = match owner {
            CodeOwner::Link(id) => (Some(id.to_string()), None),
            CodeOwner::File(id) => (None, Some(id.to_string())),
        };

        let mut created = Vec::with_capacity(codes.len());
        for (i, code) in codes.iter().enumerate() {
            let entry = short_codes::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                short_code: Set(code.clone()),
                link_id: Set(link_id.clone()),
                file_id: Set(file_id.clone()),
                is_primary: Set(i == 0),
                created_at: Set(Utc::now()),
            };
            created.push(entry.insert(db).await?);
        }

        Ok(created)
    }

    pub async fn codes_for_link(
        db: &DatabaseConnection,
        link_id: &str,
    ) -> Result<Vec<short_codes::Model>, AppError> {
        let codes = ShortCodes::find()
            .filter(short_codes::Column::LinkId.eq(link_id))
            .order_by_desc(short_codes::Column::IsPrimary)
            .order_by_asc(short_codes::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(codes)
    }

    pub async fn codes_for_file(
        db: &DatabaseConnection,
        file_id: &str,
    ) -> Result<Vec<short_codes::Model>, AppError> {
        let codes = ShortCodes::find()
            .filter(short_codes::Column::FileId.eq(file_id))
            .order_by_desc(short_codes::Column::IsPrimary)
            .order_by_asc(short_codes::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(codes)
    }

    /// Default code for a link: 6 random alphanumeric characters.
    pub fn generate_link_code() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect()
    }

    /// Default code for a file: `f-` prefix plus 8 hex characters.
    pub fn generate_file_code() -> String {
        let mut bytes = [0u8; 4];
        rand::thread_rng().fill(&mut bytes);
        format!("f-{}", hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::is_valid_short_code;

    #[test]
    fn test_generated_link_codes_are_valid() {
        for _ in 0..50 {
            let code = ShortCodeResolver::generate_link_code();
            assert_eq!(code.len(), 6);
            assert!(is_valid_short_code(&code), "invalid code: {}", code);
        }
    }

    #[test]
    fn test_generated_file_codes_are_valid_and_prefixed() {
        for _ in 0..50 {
            let code = ShortCodeResolver::generate_file_code();
            assert!(code.starts_with("f-"));
            assert_eq!(code.len(), 10);
            assert!(is_valid_short_code(&code), "invalid code: {}", code);
        }
    }
}
