// web-server/src/api/error.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::PlatformError;
use serde_json::json;
use thiserror::Error;

/// HTTP face of [`PlatformError`].
///
/// Body is always `{"error": <code>, "detail": <message>}`. When built with
/// [`ApiError::clearing`] the response also removes the session cookie.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: PlatformError,
    clear_cookie: Option<String>,
}

impl ApiError {
    pub fn clearing(error: PlatformError, cookie_name: &str) -> Self {
        Self {
            error,
            clear_cookie: Some(cookie_name.to_string()),
        }
    }
}

impl From<PlatformError> for ApiError {
    fn from(error: PlatformError) -> Self {
        Self {
            error,
            clear_cookie: None,
        }
    }
}

pub fn status_for(error: &PlatformError) -> StatusCode {
    match error {
        PlatformError::ChallengeMissing
        | PlatformError::SignatureInvalid
        | PlatformError::Unauthenticated => StatusCode::UNAUTHORIZED,
        PlatformError::InsufficientRole | PlatformError::Forbidden => StatusCode::FORBIDDEN,
        PlatformError::InvalidAddress(_) | PlatformError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PlatformError::TradeNotFound(_) => StatusCode::NOT_FOUND,
        PlatformError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        PlatformError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Removal cookie for the session credential
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(name.to_string(), "")
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(0))
        .finish()
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        status_for(&self.error)
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match &self.error {
            PlatformError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = HttpResponse::build(self.status_code());
        if let Some(name) = &self.clear_cookie {
            response.cookie(removal_cookie(name));
        }
        response.json(json!({
            "error": self.error.code(),
            "detail": detail
        }))
    }
}
