use clap::Parser;
use dotenvy::dotenv;
use rust_link_backend::config::AppConfig;
use rust_link_backend::infrastructure::{database, storage};
use rust_link_backend::services::rate_limit::RateLimiter;
use rust_link_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_link_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rust Link Backend...");

    let config = Arc::new(AppConfig::from_env());
    info!(
        "Config: prefixes=/{}+/{}, upload limit={}/{}s, analytics={}",
        config.link_prefix,
        config.file_prefix,
        config.upload_rate_limit,
        config.upload_rate_window_secs,
        config.analytics
    );

    let db = database::setup_database().await?;
    let storage_service = storage::setup_storage(&config).await;

    let rate_limiter = Arc::new(RateLimiter::new());

    // Hourly sweep keeps the limiter map bounded to active clients.
    {
        let limiter = rate_limiter.clone();
        let idle_for = chrono::Duration::seconds(config.upload_rate_window_secs as i64);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                let evicted = limiter.sweep(idle_for, chrono::Utc::now());
                if evicted > 0 {
                    tracing::debug!("Rate limiter sweep evicted {} idle clients", evicted);
                }
            }
        });
    }

    let state = AppState {
        db,
        storage: storage_service,
        rate_limiter,
        config,
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API Server listening on: http://0.0.0.0:{}", args.port);
    info!(
        "Swagger UI documentation: http://localhost:{}/swagger-ui",
        args.port
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server runtime error: {}", e);
    }

    info!("Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("SIGTERM received, initiating graceful shutdown...");
        },
    }
}
