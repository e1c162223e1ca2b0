use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use configuration::AtomicSettings;
use database::DbRepository;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;
pub mod pool;
pub mod stream;

use handlers::ProcessReply;
use pool::ResponsePool;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub db_repo: DbRepository,
    pub response_pool: ResponsePool<ProcessReply>,
    pub atomic: AtomicSettings,
}

/// The main function to configure and run the web server.
pub async fn run_server(addr: SocketAddr) -> anyhow::Result<()> {
    // Note: Tracing is already initialized in main.rs, so we don't need to
    // initialize it again here.

    dotenvy::dotenv().ok();
    let config = configuration::load_config()?;
    let db_pool = database::connect().await?;
    database::run_migrations(&db_pool).await?;
    let db_repo = DbRepository::new(db_pool);

    let app_state = Arc::new(AppState {
        db_repo,
        response_pool: ResponsePool::new(config.server.response_pool_capacity),
        atomic: config.atomic,
    });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    // --- DEFINE THE APPLICATION ROUTES ---
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/process", get(handlers::process))
        .route("/sql-stream", get(handlers::sql_stream))
        .route("/atomic-operation", post(handlers::atomic_operation))
        .with_state(app_state)
        .layer(cors)
        // This middleware will automatically log information about every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024)); // The endpoints carry no meaningful bodies.

    tracing::info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
