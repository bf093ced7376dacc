use std::sync::Arc;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use unfurl_server::config::Config;
use unfurl_server::fetch::ReqwestFetcher;
use unfurl_server::state::AppState;
use unfurl_server::{app, cache};

#[tokio::main]
async fn main() {
    // Load configuration first so APP_ENV from .env also picks the log format.
    let config = Config::from_env().expect("Failed to load configuration");

    // Initialize tracing — JSON in production, human-readable in dev.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "unfurl_server=info,tower_http=info".parse().unwrap());

    if config.is_dev {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    }

    info!("🚀 Unfurl Server starting...");
    info!("📝 Configuration loaded");

    // An unreachable cache backend is fatal; there is no cache-bypass mode.
    let cache = cache::open_store(&config.cache)
        .await
        .expect("Failed to connect to cache backend");
    info!("✅ Cache backend ready ({:?})", config.cache.backend);

    let fetcher = ReqwestFetcher::new(&config.fetch).expect("Failed to build HTTP client");
    info!(
        "🌐 Fetch timeout {:?}, body limit {} bytes",
        config.fetch.timeout, config.fetch.max_body_bytes
    );

    let cors = if config.is_dev {
        info!("🔓 CORS: permissive (dev mode)");
        CorsLayer::permissive()
    } else {
        tracing::warn!("🔒 CORS: restrictive (production mode)");
        CorsLayer::new()
    };

    let state = AppState::new(cache, Arc::new(fetcher), config.fetch.max_body_bytes);

    // Prometheus metrics layer
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = app::router(state)
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        .layer(prometheus_layer)
        .layer(cors);

    let addr = config.server_addr();
    info!("🎧 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
