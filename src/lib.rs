pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::rate_limit::RateLimiter;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::profile,
        api::handlers::tokens::create_api_key,
        api::handlers::tokens::list_api_keys,
        api::handlers::tokens::revoke_api_key,
        api::handlers::links::create_link,
        api::handlers::links::list_links,
        api::handlers::links::get_link,
        api::handlers::links::update_link,
        api::handlers::links::delete_link,
        api::handlers::files::upload_file,
        api::handlers::files::list_files,
        api::handlers::files::get_file,
        api::handlers::files::update_file,
        api::handlers::files::delete_file,
        api::handlers::analytics::get_link_analytics,
        api::handlers::analytics::get_user_analytics,
        api::handlers::analytics::get_file_analytics,
        api::handlers::analytics::get_user_file_analytics,
        api::handlers::analytics::get_file_analytics_summary,
        api::handlers::resolve::resolve_short_code,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::UserResponse,
            api::handlers::auth::AuthResponse,
            api::handlers::tokens::CreateApiKeyRequest,
            api::handlers::tokens::ApiKeyResponse,
            api::handlers::tokens::CreateApiKeyResponse,
            api::handlers::links::CreateLinkRequest,
            api::handlers::links::UpdateLinkRequest,
            api::handlers::links::ShortCodeInfo,
            api::handlers::links::LinkResponse,
            api::handlers::files::UpdateFileRequest,
            api::handlers::files::FileResponse,
            api::handlers::analytics::LinkClicksResponse,
            api::handlers::analytics::FileDownloadsResponse,
            services::analytics::LinkAnalyticsSummary,
            services::analytics::UserAnalytics,
            services::analytics::FileAnalyticsSummary,
            services::analytics::UserFileAnalytics,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login, and sessions"),
        (name = "links", description = "Short link management"),
        (name = "files", description = "File sharing"),
        (name = "analytics", description = "Click and download analytics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    /// Absent when the object store is not configured; file paths then
    /// answer service-unavailable instead of crashing.
    pub storage: Option<Arc<dyn StorageService>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        .route(
            "/auth/register",
            post(api::handlers::auth::register),
        )
        .route("/auth/login", post(api::handlers::auth::login))
        .route(
            "/auth/profile",
            get(api::handlers::auth::profile).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_auth,
            )),
        )
        .route(
            "/tokens",
            post(api::handlers::tokens::create_api_key)
                .get(api::handlers::tokens::list_api_keys)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::session_auth,
                )),
        )
        .route(
            "/tokens/:id",
            axum::routing::delete(api::handlers::tokens::revoke_api_key).layer(
                from_fn_with_state(state.clone(), api::middleware::auth::session_auth),
            ),
        )
        .route(
            "/links",
            post(api::handlers::links::create_link)
                .get(api::handlers::links::list_links)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::session_auth,
                )),
        )
        .route(
            "/links/:id",
            get(api::handlers::links::get_link)
                .put(api::handlers::links::update_link)
                .delete(api::handlers::links::delete_link)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::session_auth,
                )),
        )
        .route(
            "/analytics/links/:id",
            get(api::handlers::analytics::get_link_analytics).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_auth,
            )),
        )
        .route(
            "/analytics/user",
            get(api::handlers::analytics::get_user_analytics).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_auth,
            )),
        )
        .route(
            "/analytics/files",
            get(api::handlers::analytics::get_user_file_analytics).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_auth,
            )),
        )
        .route(
            "/analytics/files/:id/summary",
            get(api::handlers::analytics::get_file_analytics_summary).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_auth,
            )),
        )
        // Files accept API keys as well as sessions; upload additionally
        // passes the per-IP rate limiter.
        .route(
            "/files",
            post(api::handlers::files::upload_file)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::rate_limit::upload_rate_limit,
                ))
                .get(api::handlers::files::list_files)
                .layer::<_, std::convert::Infallible>(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::session_or_api_key_auth,
                ))
                .layer(DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024, // multipart overhead
                )),
        )
        .route(
            "/files/:id",
            get(api::handlers::files::get_file)
                .put(api::handlers::files::update_file)
                .delete(api::handlers::files::delete_file)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::session_or_api_key_auth,
                )),
        )
        .route(
            "/files/:id/analytics",
            get(api::handlers::analytics::get_file_analytics).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::session_or_api_key_auth,
            )),
        );

    let mut app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .nest("/api/v1", api_routes);

    // Both public namespaces funnel into the same type-agnostic resolver;
    // a unified prefix registers a single route.
    app = app.route(
        &format!("/{}/:code", state.config.link_prefix),
        get(api::handlers::resolve::resolve_short_code),
    );
    if state.config.file_prefix != state.config.link_prefix {
        app = app.route(
            &format!("/{}/:code", state.config.file_prefix),
            get(api::handlers::resolve::resolve_short_code),
        );
    }

    app.layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}
