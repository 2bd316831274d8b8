// Each integration-test binary pulls in its own copy of this module and
// uses a different subset of the helpers.
#![allow(dead_code)]

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use auth_service::config::AuthConfig;
use auth_service::credentials::hash_password;
use auth_service::metrics::AuthMetrics;
use auth_service::notifications::NoopNotifier;
use auth_service::store::AuthStore;
use auth_service::tokens::{TokenConfig, TokenSigner};
use auth_service::AppState;
use common_auth::{JwtConfig, TokenVerifier};
use dirs::cache_dir;
use pg_embed::pg_enums::PgAuthMethod;
use pg_embed::pg_fetch::{PgFetchSettings, PG_V13};
use pg_embed::postgres::{PgEmbed, PgSettings};
use portpicker::pick_unused_port;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

pub const TEST_TOKEN_SECRET: &str = "auth-service-test-secret";

pub struct TestDatabase {
    pool: PgPool,
    embedded: Option<EmbeddedPg>,
}

impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        if env::var("AUTH_TEST_DATABASE_URL").is_err() && !env_flag_enabled("AUTH_TEST_USE_EMBED") {
            eprintln!(
                "Skipping auth-service integration tests: set AUTH_TEST_DATABASE_URL or AUTH_TEST_USE_EMBED=1 to run them.",
            );
            return Ok(None);
        }

        let mut embedded = None;
        let database_url = if let Ok(url) = env::var("AUTH_TEST_DATABASE_URL") {
            url
        } else {
            if env_flag_enabled("AUTH_TEST_EMBED_CLEAR_CACHE") {
                if let Some(cache_dir) = cache_dir() {
                    let _ = std::fs::remove_dir_all(cache_dir.join("pg-embed"));
                }
            }

            let temp = tempdir()?;
            let port = pick_unused_port()
                .context("failed to find available port for embedded Postgres")?;

            let mut fetch_settings = PgFetchSettings::default();
            fetch_settings.version = PG_V13;

            let mut pg = PgEmbed::new(
                PgSettings {
                    database_dir: temp.path().to_path_buf(),
                    port,
                    user: "postgres".to_string(),
                    password: "postgres".to_string(),
                    auth_method: PgAuthMethod::Plain,
                    persistent: false,
                    timeout: Some(Duration::from_secs(30)),
                    migration_dir: None,
                },
                fetch_settings,
            )
            .await?;

            pg.setup().await?;
            pg.start_db().await?;

            let uri = format!("{}/postgres", pg.db_uri);
            embedded = Some(EmbeddedPg {
                pg,
                _temp_dir: temp,
            });
            uri
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        if embedded.is_some() || env_flag_enabled("AUTH_TEST_APPLY_MIGRATIONS") {
            run_migrations(&pool).await?;
        }

        Ok(Some(Self { pool, embedded }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub async fn teardown(self) -> Result<()> {
        if let Some(embedded) = self.embedded {
            embedded.shutdown().await;
        }
        Ok(())
    }
}

struct EmbeddedPg {
    pg: PgEmbed,
    _temp_dir: TempDir,
}

impl EmbeddedPg {
    async fn shutdown(mut self) {
        let _ = self.pg.stop_db().await;
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrations_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut entries = std::fs::read_dir(&migrations_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        let sql = std::fs::read_to_string(&path)?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(pool).await?;
        }
    }

    Ok(())
}

pub fn test_state(pool: PgPool) -> AppState {
    let config = AuthConfig {
        token_secret: TEST_TOKEN_SECRET.to_string(),
        token_ttl_seconds: 3600,
        invite_ttl_hours: 48,
        public_base_url: "http://localhost:3000".to_string(),
        smtp: None,
    };

    AppState {
        store: AuthStore::new(pool),
        signer: Arc::new(TokenSigner::new(TokenConfig {
            secret: config.token_secret.clone(),
            ttl_seconds: config.token_ttl_seconds,
        })),
        verifier: Arc::new(TokenVerifier::new(JwtConfig::new(
            config.token_secret.clone(),
        ))),
        notifier: Arc::new(NoopNotifier),
        config: Arc::new(config),
        metrics: Arc::new(AuthMetrics::new().expect("metrics registry")),
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeededOrg {
    pub organization_id: Uuid,
    pub admin_role_id: Uuid,
    pub admin_user_id: Uuid,
    pub email: String,
    pub password: String,
}

pub async fn seed_org_with_admin(pool: &PgPool, name: &str, email: &str) -> Result<SeededOrg> {
    let organization_id = Uuid::new_v4();
    let admin_role_id = Uuid::new_v4();
    let admin_user_id = Uuid::new_v4();
    let password = "CorrectHorseBatteryStaple!".to_string();
    let password_hash = hash_password(&password)?;

    sqlx::query("INSERT INTO organizations (id, name) VALUES ($1, $2)")
        .bind(organization_id)
        .bind(name)
        .execute(pool)
        .await?;

    sqlx::query(
        "INSERT INTO roles (id, organization_id, name, home, create_job, view_job, iam)
         VALUES ($1, $2, 'admin', TRUE, TRUE, TRUE, TRUE)",
    )
    .bind(admin_role_id)
    .bind(organization_id)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, role_id, organization_id)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(admin_user_id)
    .bind(email)
    .bind(&password_hash)
    .bind(admin_role_id)
    .bind(organization_id)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE organizations SET created_by = $1 WHERE id = $2")
        .bind(admin_user_id)
        .bind(organization_id)
        .execute(pool)
        .await?;

    Ok(SeededOrg {
        organization_id,
        admin_role_id,
        admin_user_id,
        email: email.to_string(),
        password,
    })
}

pub async fn seed_role(
    pool: &PgPool,
    organization_id: Uuid,
    name: &str,
    iam: bool,
) -> Result<Uuid> {
    let role_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO roles (id, organization_id, name, home, create_job, view_job, iam)
         VALUES ($1, $2, $3, TRUE, FALSE, TRUE, $4)",
    )
    .bind(role_id)
    .bind(organization_id)
    .bind(name)
    .bind(iam)
    .execute(pool)
    .await?;
    Ok(role_id)
}

pub async fn count_rows(pool: &PgPool, table: &str) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
