use axum::{
    extract::{DefaultBodyLimit, State},
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use common_auth::{JwtConfig, TokenVerifier};
use job_service::application_handlers::{upload_cover_letter, upload_metadata, upload_resume};
use job_service::config::load_job_config;
use job_service::job_handlers::{create_job, get_job, list_jobs};
use job_service::metrics::JobMetrics;
use job_service::storage::LocalStorage;
use job_service::AppState;

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            warn!(error = ?err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_job_config()?;
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = PgPool::connect(&database_url).await?;

    let storage = Arc::new(LocalStorage::new(config.storage_root.clone()).await?);
    let verifier = Arc::new(TokenVerifier::new(JwtConfig::new(
        config.token_secret.clone(),
    )));
    let metrics = Arc::new(JobMetrics::new()?);

    let max_upload_bytes = config.max_upload_bytes;
    let state = AppState {
        db: db_pool,
        storage,
        verifier,
        config: Arc::new(config),
        metrics,
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE]);

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .route("/jobs", post(create_job))
        .route("/jobs/:job_id", get(get_job))
        .route("/organizations/:org_id/jobs", get(list_jobs))
        .route("/applications/resume", post(upload_resume))
        .route("/applications/cover-letter", post(upload_cover_letter))
        .route("/applications/metadata", post(upload_metadata))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8087);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    println!("starting job-service on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
