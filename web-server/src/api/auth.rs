// web-server/src/api/auth.rs
use actix_web::cookie::Cookie;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use common::models::session::{Session, SessionIdentity, SessionResponse};
use common::{parse_wallet_address, PlatformError, WalletEvent};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::session_cookie::SessionCookie;
use crate::auth::{AuthProtocol, LoginMode};

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub address: String,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountsChangedRequest {
    #[serde(default)]
    pub accounts: Vec<String>,
}

fn identity_json(identity: &SessionIdentity) -> serde_json::Value {
    json!({
        "address": identity.address,
        "role": identity.role,
    })
}

// Issue a login challenge
#[get("/nonce")]
pub async fn nonce(
    req: HttpRequest,
    query: web::Query<NonceQuery>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    let address = parse_wallet_address(&query.address)?;
    let existing = cookies.session_id(&req);

    let challenge = auth.begin_login(address, existing.as_deref()).await;

    // Any previous session is gone now
    let mut response = HttpResponse::Ok();
    if existing.is_some() {
        response.cookie(cookies.clear());
    }
    Ok(response.json(challenge))
}

/// Build the credential for a fresh session. A session whose credential
/// cannot be built is invalidated again.
async fn issue_or_revoke<F>(auth: &AuthProtocol, session: &Session, issue: F) -> Result<Cookie<'static>, ApiError>
where
    F: FnOnce(&Session) -> Result<Cookie<'static>, PlatformError>,
{
    match issue(session) {
        Ok(cookie) => Ok(cookie),
        Err(e) => {
            if let Err(revoke) = auth.logout(&session.session_id).await {
                tracing::warn!("Could not drop session without credential: {}", revoke);
            }
            tracing::error!("Session credential for {} not issued: {}", session.address, e);
            Err(e.into())
        }
    }
}

async fn verify_with_mode(
    body: VerifyRequest,
    mode: LoginMode,
    auth: &AuthProtocol,
    cookies: &SessionCookie,
) -> Result<HttpResponse, ApiError> {
    let address = parse_wallet_address(&body.address)?;

    let outcome = auth
        .complete_login(address, &body.signature, mode)
        .await
        .map_err(|e| cookies.reject(e))?;
    let cookie = issue_or_revoke(auth, &outcome.session, |session| cookies.issue(session)).await?;

    let body = SessionResponse {
        redirect: Some(outcome.redirect_to),
        ..SessionResponse::from(&outcome.session)
    };
    Ok(HttpResponse::Ok().cookie(cookie).json(body))
}

// Complete a login with the signed challenge
#[post("/verify")]
pub async fn verify(
    body: web::Json<VerifyRequest>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    verify_with_mode(body.into_inner(), LoginMode::Standard, &auth, &cookies).await
}

// Same as /verify, but only administrators get a session
#[post("/admin/verify")]
pub async fn admin_verify(
    body: web::Json<VerifyRequest>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    verify_with_mode(body.into_inner(), LoginMode::Admin, &auth, &cookies).await
}

#[get("/me")]
pub async fn me(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    Ok(HttpResponse::Ok().json(identity_json(&identity)))
}

// Always succeeds; a missing or stale session is already logged out
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    if let Some(session_id) = cookies.session_id(&req) {
        auth.logout(&session_id).await?;
        tracing::info!("Session logged out");
    }

    Ok(HttpResponse::Ok().cookie(cookies.clear()).json(json!({
        "status": "success",
        "message": "Logged out"
    })))
}

// Wallet notification relayed by the client. An empty account list means the
// wallet disconnected.
#[post("/account-changed")]
pub async fn account_changed(
    req: HttpRequest,
    body: web::Json<AccountsChangedRequest>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    let Some(session_id) = cookies.session_id(&req) else {
        return Ok(HttpResponse::Ok().json(json!({ "session_dropped": false })));
    };

    let accounts = body.into_inner().accounts;
    let event = if accounts.is_empty() {
        WalletEvent::Disconnected { session_id }
    } else {
        WalletEvent::AccountsChanged { session_id, accounts }
    };

    let dropped = auth.on_wallet_event(event).await?;

    let mut response = HttpResponse::Ok();
    if dropped {
        response.cookie(cookies.clear());
    }
    Ok(response.json(json!({ "session_dropped": dropped })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(nonce)
            .service(verify)
            .service(admin_verify)
            .service(me)
            .service(logout)
            .service(account_changed),
    );
}
