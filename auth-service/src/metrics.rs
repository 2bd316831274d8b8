use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    signup_attempts: IntCounterVec,
    login_attempts: IntCounterVec,
    invite_events: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let signup_attempts = IntCounterVec::new(
            Opts::new(
                "auth_signup_attempts_total",
                "Count of signup attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(signup_attempts.clone()))?;

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let invite_events = IntCounterVec::new(
            Opts::new("auth_invite_events_total", "Count of invite-flow events"),
            &["event"],
        )?;
        registry.register(Box::new(invite_events.clone()))?;

        Ok(Self {
            registry,
            signup_attempts,
            login_attempts,
            invite_events,
        })
    }

    pub fn signup_attempt(&self, outcome: &str) {
        self.signup_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn invite_event(&self, event: &str) {
        self.invite_events.with_label_values(&[event]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        // Shared-crate metrics (error responses) live in the default registry.
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
