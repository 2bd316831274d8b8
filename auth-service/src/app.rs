use std::sync::Arc;

use axum::extract::FromRef;
use common_auth::TokenVerifier;

use crate::config::AuthConfig;
use crate::metrics::AuthMetrics;
use crate::notifications::InviteNotifier;
use crate::store::AuthStore;
use crate::tokens::TokenSigner;

#[derive(Clone)]
pub struct AppState {
    pub store: AuthStore,
    pub signer: Arc<TokenSigner>,
    pub verifier: Arc<TokenVerifier>,
    pub notifier: Arc<dyn InviteNotifier>,
    pub config: Arc<AuthConfig>,
    pub metrics: Arc<AuthMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<TokenSigner> {
    fn from_ref(state: &AppState) -> Self {
        state.signer.clone()
    }
}

impl FromRef<AppState> for Arc<AuthConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
