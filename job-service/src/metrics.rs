use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct JobMetrics {
    registry: Registry,
    jobs_created: IntCounter,
    uploads: IntCounterVec,
}

impl JobMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let jobs_created = IntCounter::with_opts(Opts::new(
            "job_postings_created_total",
            "Count of job postings created",
        ))?;
        registry.register(Box::new(jobs_created.clone()))?;

        let uploads = IntCounterVec::new(
            Opts::new(
                "job_application_uploads_total",
                "Count of stored application files grouped by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(uploads.clone()))?;

        Ok(Self {
            registry,
            jobs_created,
            uploads,
        })
    }

    pub fn job_created(&self) {
        self.jobs_created.inc();
    }

    pub fn upload(&self, kind: &str) {
        self.uploads.with_label_values(&[kind]).inc();
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
