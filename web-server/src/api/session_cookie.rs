// web-server/src/api/session_cookie.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use common::config::SessionConfig;
use common::models::session::{Session, SessionIdentity};
use common::{decode_session_token, encode_session_token, PlatformError};

use super::error::{removal_cookie, ApiError};
use crate::auth::AuthProtocol;

/// Issues and reads the signed session cookie
#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    secret: Vec<u8>,
    ttl_seconds: i64,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secret: impl AsRef<[u8]>, ttl_seconds: i64, secure: bool) -> Self {
        Self {
            name: name.into(),
            secret: secret.as_ref().to_vec(),
            ttl_seconds,
            secure,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.cookie_name.clone(),
            config.secret.as_bytes(),
            config.ttl_seconds,
            config.cookie_secure,
        )
    }

    pub fn issue(&self, session: &Session) -> Result<Cookie<'static>, PlatformError> {
        let token = encode_session_token(session, &self.secret, self.ttl_seconds)
            .map_err(|e| PlatformError::Internal(format!("failed to sign session token: {e}")))?;

        Ok(Cookie::build(self.name.clone(), token)
            .path("/")
            .secure(self.secure)
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(self.ttl_seconds))
            .finish())
    }

    pub fn clear(&self) -> Cookie<'static> {
        removal_cookie(&self.name)
    }

    /// Session id carried by a valid cookie on the request
    pub fn session_id(&self, req: &HttpRequest) -> Option<String> {
        let cookie = req.cookie(&self.name)?;
        match decode_session_token(cookie.value(), &self.secret) {
            Ok(claims) => Some(claims.sid),
            Err(e) => {
                tracing::debug!("Ignoring session cookie: {}", e);
                None
            }
        }
    }

    /// Wrap an error so that auth failures also remove the cookie
    pub fn reject(&self, error: PlatformError) -> ApiError {
        if error.is_auth_failure() {
            ApiError::clearing(error, &self.name)
        } else {
            ApiError::from(error)
        }
    }

    /// Resolve the requester of a protected call
    pub async fn authenticate(&self, req: &HttpRequest, auth: &AuthProtocol) -> Result<SessionIdentity, ApiError> {
        let session_id = self
            .session_id(req)
            .ok_or_else(|| self.reject(PlatformError::Unauthenticated))?;

        auth.resolve(&session_id).await.map_err(|e| self.reject(e))
    }

    /// Resolve the requester and require the admin role
    pub async fn authenticate_admin(&self, req: &HttpRequest, auth: &AuthProtocol) -> Result<SessionIdentity, ApiError> {
        let session_id = self
            .session_id(req)
            .ok_or_else(|| self.reject(PlatformError::Unauthenticated))?;

        auth.require_admin(&session_id).await.map_err(|e| self.reject(e))
    }
}
