use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::services::resolver::ShortCodeResolver;
use crate::utils::request::RequestMeta;
use chrono::{DateTime, Datelike, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkAnalyticsSummary {
    pub link_id: String,
    pub original_url: String,
    pub title: Option<String>,
    pub short_code: Option<String>,
    pub total_clicks: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserAnalytics {
    pub user_id: String,
    pub total_links: u64,
    pub total_clicks: i64,
    pub clicks_today: u64,
    pub clicks_this_week: u64,
    pub clicks_this_month: u64,
    pub top_links: Vec<LinkAnalyticsSummary>,
    #[schema(value_type = Vec<Object>)]
    pub recent_clicks: Vec<clicks::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileAnalyticsSummary {
    pub file_id: String,
    pub total_downloads: i64,
    pub downloads_today: u64,
    pub downloads_this_week: u64,
    pub downloads_this_month: u64,
    pub unique_visitors: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserFileAnalytics {
    pub user_id: String,
    pub total_files: u64,
    pub total_downloads: i64,
    pub total_file_size_bytes: i64,
}

pub struct AnalyticsService;

impl AnalyticsService {
    // ── Best-effort write path ────────────────────────────────────────

    /// Atomic `clicks = clicks + 1` at the store; concurrent increments are
    /// serialized by the database's row-level locking, not by us. Failure is
    /// logged and swallowed so a redirect never breaks on accounting.
    pub async fn increment_clicks(db: &DatabaseConnection, link_id: &str) {
        let result = Links::update_many()
            .col_expr(
                links::Column::Clicks,
                Expr::col(links::Column::Clicks).add(1),
            )
            .filter(links::Column::Id.eq(link_id))
            .exec(db)
            .await;

        if let Err(e) = result {
            tracing::warn!(link_id, "Failed to increment click counter: {}", e);
        }
    }

    pub async fn increment_downloads(db: &DatabaseConnection, file_id: &str) {
        let result = Files::update_many()
            .col_expr(
                files::Column::Downloads,
                Expr::col(files::Column::Downloads).add(1),
            )
            .filter(files::Column::Id.eq(file_id))
            .exec(db)
            .await;

        if let Err(e) = result {
            tracing::warn!(file_id, "Failed to increment download counter: {}", e);
        }
    }

    /// Append a click event. Independent of the counter increment; neither
    /// waits for nor assumes the other.
    pub async fn record_click(db: &DatabaseConnection, link_id: &str, meta: &RequestMeta) {
        let event = clicks::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            link_id: Set(link_id.to_string()),
            ip_address: Set(meta.ip_address.clone()),
            user_agent: Set(meta.user_agent.clone()),
            referer: Set(meta.referer.clone()),
            country: Set(None),
            created_at: Set(Utc::now()),
        };

        if let Err(e) = event.insert(db).await {
            tracing::warn!(link_id, "Failed to record click event: {}", e);
        }
    }

    pub async fn record_download(db: &DatabaseConnection, file_id: &str, meta: &RequestMeta) {
        let event = file_downloads::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            file_id: Set(file_id.to_string()),
            ip_address: Set(meta.ip_address.clone()),
            user_agent: Set(meta.user_agent.clone()),
            referer: Set(meta.referer.clone()),
            country: Set(None),
            created_at: Set(Utc::now()),
        };

        if let Err(e) = event.insert(db).await {
            tracing::warn!(file_id, "Failed to record download event: {}", e);
        }
    }

    // ── Query path (owner-scoped) ─────────────────────────────────────

    pub async fn link_clicks(
        db: &DatabaseConnection,
        link_id: &str,
        user_id: &str,
    ) -> Result<Vec<clicks::Model>, AppError> {
        Links::find_by_id(link_id)
            .filter(links::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))?;

        let clicks = Clicks::find()
            .filter(clicks::Column::LinkId.eq(link_id))
            .order_by_desc(clicks::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(clicks)
    }

    pub async fn file_downloads(
        db: &DatabaseConnection,
        file_id: &str,
        user_id: &str,
    ) -> Result<Vec<file_downloads::Model>, AppError> {
        Files::find_by_id(file_id)
            .filter(files::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        let downloads = FileDownloads::find()
            .filter(file_downloads::Column::FileId.eq(file_id))
            .order_by_desc(file_downloads::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(downloads)
    }

    pub async fn user_overview(
        db: &DatabaseConnection,
        user_id: &str,
    ) -> Result<UserAnalytics, AppError> {
        let now = Utc::now();

        let total_links = Links::find()
            .filter(links::Column::UserId.eq(user_id))
            .count(db)
            .await?;

        // Counters are summed in Rust: a user's link set is small and this
        // stays portable across sqlite and postgres.
        let click_counts: Vec<i64> = Links::find()
            .select_only()
            .column(links::Column::Clicks)
            .filter(links::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        let total_clicks = click_counts.iter().sum();

        let clicks_today = Self::user_clicks_since(db, user_id, day_start(now)).await?;
        let clicks_this_week =
            Self::user_clicks_since(db, user_id, now - chrono::Duration::days(7)).await?;
        let clicks_this_month = Self::user_clicks_since(db, user_id, month_start(now)).await?;

        let mut top_links = Vec::new();
        for link in Links::find()
            .filter(links::Column::UserId.eq(user_id))
            .order_by_desc(links::Column::Clicks)
            .limit(10)
            .all(db)
            .await?
        {
            let codes = ShortCodeResolver::codes_for_link(db, &link.id).await?;
            top_links.push(LinkAnalyticsSummary {
                link_id: link.id,
                original_url: link.original_url,
                title: link.title,
                short_code: codes
                    .iter()
                    .find(|c| c.is_primary)
                    .map(|c| c.short_code.clone()),
                total_clicks: link.clicks,
            });
        }

        let recent_clicks = Clicks::find()
            .join(JoinType::InnerJoin, clicks::Relation::Links.def())
            .filter(links::Column::UserId.eq(user_id))
            .order_by_desc(clicks::Column::CreatedAt)
            .limit(10)
            .all(db)
            .await?;

        Ok(UserAnalytics {
            user_id: user_id.to_string(),
            total_links,
            total_clicks,
            clicks_today,
            clicks_this_week,
            clicks_this_month,
            top_links,
            recent_clicks,
        })
    }

    pub async fn file_summary(
        db: &DatabaseConnection,
        file_id: &str,
        user_id: &str,
    ) -> Result<FileAnalyticsSummary, AppError> {
        let file = Files::find_by_id(file_id)
            .filter(files::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        let now = Utc::now();
        let downloads_today = Self::file_downloads_since(db, file_id, day_start(now)).await?;
        let downloads_this_week =
            Self::file_downloads_since(db, file_id, now - chrono::Duration::days(7)).await?;
        let downloads_this_month =
            Self::file_downloads_since(db, file_id, month_start(now)).await?;

        let visitor_ips: Vec<Option<String>> = FileDownloads::find()
            .select_only()
            .column(file_downloads::Column::IpAddress)
            .distinct()
            .filter(file_downloads::Column::FileId.eq(file_id))
            .into_tuple()
            .all(db)
            .await?;
        let unique_visitors = visitor_ips.iter().filter(|ip| ip.is_some()).count() as u64;

        Ok(FileAnalyticsSummary {
            file_id: file_id.to_string(),
            total_downloads: file.downloads,
            downloads_today,
            downloads_this_week,
            downloads_this_month,
            unique_visitors,
        })
    }

    pub async fn user_file_overview(
        db: &DatabaseConnection,
        user_id: &str,
    ) -> Result<UserFileAnalytics, AppError> {
        let total_files = Files::find()
            .filter(files::Column::UserId.eq(user_id))
            .count(db)
            .await?;

        let rows: Vec<(i64, i64)> = Files::find()
            .select_only()
            .column(files::Column::Downloads)
            .column(files::Column::FileSize)
            .filter(files::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;

        Ok(UserFileAnalytics {
            user_id: user_id.to_string(),
            total_files,
            total_downloads: rows.iter().map(|(downloads, _)| downloads).sum(),
            total_file_size_bytes: rows.iter().map(|(_, size)| size).sum(),
        })
    }

    async fn user_clicks_since(
        db: &DatabaseConnection,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let count = Clicks::find()
            .join(JoinType::InnerJoin, clicks::Relation::Links.def())
            .filter(links::Column::UserId.eq(user_id))
            .filter(clicks::Column::CreatedAt.gte(since))
            .count(db)
            .await?;
        Ok(count)
    }

    async fn file_downloads_since(
        db: &DatabaseConnection,
        file_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let count = FileDownloads::find()
            .filter(file_downloads::Column::FileId.eq(file_id))
            .filter(file_downloads::Column::CreatedAt.gte(since))
            .count(db)
            .await?;
        Ok(count)
    }
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    first.and_time(NaiveTime::MIN).and_utc()
}
