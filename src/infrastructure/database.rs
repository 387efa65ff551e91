use crate::entities::{
    api_keys, clicks, domains, file_downloads, files, links, short_codes, users,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://linker.db?mode=rwc".to_string());

    info!("Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("Database connected successfully");

    run_migrations(&db, &db_url).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection, db_url: &str) -> anyhow::Result<()> {
    if db_url.starts_with("postgres://") {
        info!("Running SQLx migrations for PostgreSQL...");
        let pool = sqlx::PgPool::connect(db_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
    } else {
        info!("Running SeaORM auto-migrations for SQLite...");
        create_schema(db).await?;
    }

    Ok(())
}

/// Schema-from-entity path, used for sqlite and by the integration tests.
pub async fn create_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(domains::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(links::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(short_codes::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(clicks::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(file_downloads::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(api_keys::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
    }

    // Lookup indexes the entity derives don't cover
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_short_codes_link_id ON short_codes(link_id)",
        "CREATE INDEX IF NOT EXISTS idx_short_codes_file_id ON short_codes(file_id)",
        "CREATE INDEX IF NOT EXISTS idx_clicks_link_id ON clicks(link_id)",
        "CREATE INDEX IF NOT EXISTS idx_file_downloads_file_id ON file_downloads(file_id)",
        "CREATE INDEX IF NOT EXISTS idx_links_user_id ON links(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_user_id ON files(user_id)",
    ];
    for index in indexes {
        let _ = db
            .execute(sea_orm::Statement::from_string(builder, index.to_string()))
            .await;
    }

    Ok(())
}
