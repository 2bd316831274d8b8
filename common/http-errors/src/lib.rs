use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;
use serde::Serialize;

static ERROR_RESPONSES: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "http_error_responses_total",
        "Count of error responses grouped by error code",
        &["code"]
    )
    .expect("error response counter registration")
});

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Error taxonomy shared by every service. Each variant carries a stable
/// machine-readable code that is also emitted in the `X-Error-Code` header.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: Option<String> },
    Unauthorized { code: &'static str },
    Forbidden { code: &'static str },
    NotFound { code: &'static str },
    Conflict { code: &'static str, message: Option<String> },
    /// Time-based invalidation (e.g. a lapsed invite). 400, not 404: the
    /// record exists but can no longer be acted on.
    Expired { code: &'static str },
    Internal { message: Option<String> },
    /// A best-effort notification failed after state was already persisted.
    NotificationFailure { message: Option<String> },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::BadRequest { code: "validation", message: Some(message.into()) }
    }

    pub fn bad_request(code: &'static str) -> Self {
        Self::BadRequest { code, message: None }
    }

    pub fn unauthorized(code: &'static str) -> Self {
        Self::Unauthorized { code }
    }

    pub fn forbidden(code: &'static str) -> Self {
        Self::Forbidden { code }
    }

    pub fn not_found(code: &'static str) -> Self {
        Self::NotFound { code }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict { code, message: Some(message.into()) }
    }

    pub fn expired(code: &'static str) -> Self {
        Self::Expired { code }
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal { message: Some(e.to_string()) }
    }

    pub fn notification<E: std::fmt::Display>(e: E) -> Self {
        Self::NotificationFailure { message: Some(e.to_string()) }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::Expired { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } | ApiError::NotificationFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code }
            | ApiError::Forbidden { code }
            | ApiError::NotFound { code }
            | ApiError::Conflict { code, .. }
            | ApiError::Expired { code } => code,
            ApiError::Internal { .. } => "internal_error",
            ApiError::NotificationFailure { .. } => "notification_failed",
        }
    }

    fn into_body(self) -> ErrorBody {
        let code = self.code().to_string();
        let message = match self {
            ApiError::BadRequest { message, .. }
            | ApiError::Conflict { message, .. }
            | ApiError::Internal { message }
            | ApiError::NotificationFailure { message } => message,
            _ => None,
        };
        ErrorBody { code, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        ERROR_RESPONSES.with_label_values(&[error_code]).inc();

        let mut resp = (status, Json(self.into_body())).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
