use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub domain_id: Option<String>,
    pub original_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub clicks: i64,
    pub analytics: bool,
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
    #[sea_orm(has_many = "super::clicks::Entity")]
    Clicks,
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

impl Related<super::clicks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clicks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
