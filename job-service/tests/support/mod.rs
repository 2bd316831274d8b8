// Each integration-test binary pulls in its own copy of this module and
// uses a different subset of the helpers.
#![allow(dead_code)]

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use common_auth::{JwtConfig, TokenVerifier, WireClaims};
use dirs::cache_dir;
use job_service::config::JobConfig;
use job_service::metrics::JobMetrics;
use job_service::storage::LocalStorage;
use job_service::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pg_embed::pg_enums::PgAuthMethod;
use pg_embed::pg_fetch::{PgFetchSettings, PG_V13};
use pg_embed::postgres::{PgEmbed, PgSettings};
use portpicker::pick_unused_port;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

pub const TEST_TOKEN_SECRET: &str = "job-service-test-secret";

pub struct TestDatabase {
    pool: PgPool,
    embedded: Option<EmbeddedPg>,
}

impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        if env::var("JOB_TEST_DATABASE_URL").is_err() && !env_flag_enabled("JOB_TEST_USE_EMBED") {
            eprintln!(
                "Skipping job-service integration tests: set JOB_TEST_DATABASE_URL or JOB_TEST_USE_EMBED=1 to run them.",
            );
            return Ok(None);
        }

        let mut embedded = None;
        let database_url = if let Ok(url) = env::var("JOB_TEST_DATABASE_URL") {
            url
        } else {
            if env_flag_enabled("JOB_TEST_EMBED_CLEAR_CACHE") {
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

        if embedded.is_some() || env_flag_enabled("JOB_TEST_APPLY_MIGRATIONS") {
            run_migrations(&pool).await?;
            // The organizations table is owned by the auth service; tests
            // provision a minimal copy so foreign lookups resolve.
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS organizations (
                     id UUID PRIMARY KEY,
                     name TEXT NOT NULL UNIQUE,
                     created_by UUID,
                     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                 )",
            )
            .execute(&pool)
            .await?;
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

pub async fn test_state(pool: PgPool, storage_root: &std::path::Path) -> Result<AppState> {
    let config = JobConfig {
        token_secret: TEST_TOKEN_SECRET.to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        storage_root: storage_root.to_path_buf(),
        max_upload_bytes: 30 << 20,
    };

    Ok(AppState {
        db: pool,
        storage: Arc::new(LocalStorage::new(storage_root).await?),
        verifier: Arc::new(TokenVerifier::new(JwtConfig::new(
            config.token_secret.clone(),
        ))),
        config: Arc::new(config),
        metrics: Arc::new(JobMetrics::new()?),
    })
}

pub async fn seed_organization(pool: &PgPool, name: &str) -> Result<Uuid> {
    let organization_id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name) VALUES ($1, $2)")
        .bind(organization_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(organization_id)
}

/// Mints a bearer token the service's verifier accepts; the auth service
/// is not part of these tests.
pub fn sign_session_token(user_id: Uuid, role_id: Uuid, organization_id: Uuid) -> Result<String> {
    let now = chrono::Utc::now();
    let claims = WireClaims {
        sub: user_id.to_string(),
        email: "member@example.com".to_string(),
        role: role_id.to_string(),
        org: organization_id.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_TOKEN_SECRET.as_bytes()),
    )?)
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
