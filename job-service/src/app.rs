use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::TokenVerifier;
use sqlx::PgPool;

use crate::config::JobConfig;
use crate::metrics::JobMetrics;
use crate::storage::ObjectStorage;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<dyn ObjectStorage>,
    pub verifier: Arc<TokenVerifier>,
    pub config: Arc<JobConfig>,
    pub metrics: Arc<JobMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<JobConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
