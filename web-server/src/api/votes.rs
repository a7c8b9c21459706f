// web-server/src/api/votes.rs
use actix_web::{get, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::session_cookie::SessionCookie;
use crate::auth::AuthProtocol;
use crate::reconciler::VoteReconciler;

#[derive(Debug, Deserialize)]
pub struct TradeQuery {
    pub trade_id: String,
}

// Trades the requester can still vote on, and those already voted
#[get("/votes")]
pub async fn votes(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let view = reconciler.user_view(&identity.address).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[get("/contract")]
pub async fn contract(
    req: HttpRequest,
    query: web::Query<TradeQuery>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let detail = reconciler.describe(&query.trade_id, &identity.address).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("/trades/{trade_id}/status")]
pub async fn trade_status(
    req: HttpRequest,
    path: web::Path<String>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    cookies.authenticate(&req, &auth).await?;
    let record = reconciler.trade_status(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[get("/finalized-contracts")]
pub async fn finalized_contracts(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let contracts = reconciler.finalized_contracts(&identity.address).await?;
    Ok(HttpResponse::Ok().json(json!({ "finalized_contracts": contracts })))
}
