use axum::{
    extract::State,
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

use auth_service::auth_handlers::{
    accept_invite, invite, login, refresh_token, signup, validate_invite,
};
use auth_service::config::load_auth_config;
use auth_service::metrics::AuthMetrics;
use auth_service::notifications::{InviteNotifier, NoopNotifier, SmtpNotifier};
use auth_service::permissions::{check_role_permission, role_permissions};
use auth_service::store::AuthStore;
use auth_service::tokens::{TokenConfig, TokenSigner};
use auth_service::AppState;
use common_auth::{JwtConfig, TokenVerifier};

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

    let config = load_auth_config()?;
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = PgPool::connect(&database_url).await?;

    let signer = Arc::new(TokenSigner::new(TokenConfig {
        secret: config.token_secret.clone(),
        ttl_seconds: config.token_ttl_seconds,
    }));
    let verifier = Arc::new(TokenVerifier::new(JwtConfig::new(
        config.token_secret.clone(),
    )));
    let notifier: Arc<dyn InviteNotifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(
            smtp,
            &config.public_base_url,
            config.invite_ttl_hours,
        )?),
        None => {
            warn!("SMTP is not configured; invite emails are disabled");
            Arc::new(NoopNotifier)
        }
    };
    let metrics = Arc::new(AuthMetrics::new()?);

    let state = AppState {
        store: AuthStore::new(db_pool),
        signer,
        verifier,
        notifier,
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
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/validate-invite", get(validate_invite))
        .route("/accept-invite", post(accept_invite))
        .route("/invite", post(invite))
        .route("/roles/:role_id/permissions", get(role_permissions))
        .route(
            "/roles/:role_id/permissions/:capability",
            get(check_role_permission),
        )
        .with_state(state)
        .layer(cors);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8086);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    println!("starting auth-service on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
