// web-server/src/middleware/rate_limiter.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse, ResponseError,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde_json::json;

const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

#[derive(Debug)]
struct RateLimitExceeded;

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, RATE_LIMIT_WINDOW_SECONDS.to_string()))
            .json(json!({
                "error": "rate_limited",
                "detail": "Too many challenge requests. Please try again later."
            }))
    }
}

/// Per-client-IP sliding window limiter for the given path prefixes
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    store: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize) -> Self {
        Self {
            paths,
            max_requests,
            window: Duration::from_secs(RATE_LIMIT_WINDOW_SECONDS),
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn is_rate_limited(&self, ip: &str) -> bool {
        // Recover the map if a previous holder panicked
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let window = self.window;

        // Forget clients with no hits left in the window
        store.retain(|_, hits| {
            hits.retain(|time| now.duration_since(*time) < window);
            !hits.is_empty()
        });

        let hits = store.entry(ip.to_string()).or_default();

        if hits.len() >= self.max_requests {
            true
        } else {
            hits.push(now);
            false
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if self.limiter.is_rate_limited(&ip) {
                tracing::warn!("Rate limit exceeded for IP: {}", ip);
                return Box::pin(async { Err(RateLimitExceeded.into()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{web, App};

    #[test]
    fn test_limit_is_per_ip() {
        let limiter = RateLimiter::new(vec!["/auth/nonce".to_string()], 2);

        assert!(!limiter.is_rate_limited("10.0.0.1"));
        assert!(!limiter.is_rate_limited("10.0.0.1"));
        assert!(limiter.is_rate_limited("10.0.0.1"));
        assert!(!limiter.is_rate_limited("10.0.0.2"));
    }

    #[test]
    fn test_idle_clients_are_forgotten() {
        let limiter = RateLimiter::new(vec!["/auth/nonce".to_string()], 5);
        let Some(long_ago) = Instant::now().checked_sub(Duration::from_secs(2 * RATE_LIMIT_WINDOW_SECONDS)) else {
            return;
        };
        limiter
            .store
            .lock()
            .unwrap()
            .insert("10.0.0.9".to_string(), vec![long_ago]);

        assert!(!limiter.is_rate_limited("10.0.0.1"));

        let store = limiter.store.lock().unwrap();
        assert!(!store.contains_key("10.0.0.9"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_path_prefix_matching() {
        let limiter = RateLimiter::new(vec!["/auth/nonce".to_string()], 1);
        assert!(limiter.applies_to("/auth/nonce"));
        assert!(!limiter.applies_to("/auth/verify"));
    }

    #[actix_web::test]
    async fn test_middleware_returns_429() {
        let app = actix_test::init_service(
            App::new()
                .wrap(RateLimiter::new(vec!["/limited".to_string()], 1))
                .route("/limited", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route("/open", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let first = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/limited").to_request()).await;
        assert!(first.status().is_success());

        let second = actix_test::try_call_service(&app, actix_test::TestRequest::get().uri("/limited").to_request()).await;
        let response = match second {
            Ok(_) => panic!("second request should be limited"),
            Err(e) => e.error_response(),
        };
        assert_eq!(response.status(), actix_web::http::StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        for _ in 0..3 {
            let open = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/open").to_request()).await;
            assert!(open.status().is_success());
        }
    }
}
