use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub domain_id: Option<String>,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub file_size: i64,
    #[serde(skip_serializing)]
    pub s3_key: String,
    #[serde(skip_serializing)]
    pub s3_bucket: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub downloads: i64,
    pub analytics: bool,
    pub is_public: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::domains::Entity",
        from = "Column::DomainId",
        to = "super::domains::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Domains,
    #[sea_orm(has_many = "super::short_codes::Entity")]
    ShortCodes,
    #[sea_orm(has_many = "super::file_downloads::Entity")]
    FileDownloads,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::domains::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domains.def()
    }
}

impl Related<super::short_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShortCodes.def()
    }
}

impl Related<super::file_downloads::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileDownloads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
