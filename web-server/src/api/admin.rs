// web-server/src/api/admin.rs
//! Administrator endpoints. Every handler resolves the session first and
//! refuses non-admins with 403.

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::session_cookie::SessionCookie;
use crate::auth::AuthProtocol;
use crate::reconciler::VoteReconciler;
use crate::voter_registry::VoterRegistryAdmin;

#[derive(Debug, Deserialize)]
pub struct VoteStatusQuery {
    pub trade_id: String,
    pub voter: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub trade_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddVoterRequest {
    pub voter: String,
}

#[get("/check-admin")]
pub async fn check_admin(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate_admin(&req, &auth).await?;
    Ok(HttpResponse::Ok().json(json!({
        "address": identity.address,
        "is_admin": true
    })))
}

// Live session counts from the session registry
#[get("/sessions")]
pub async fn session_metrics(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
) -> Result<HttpResponse, ApiError> {
    cookies.authenticate_admin(&req, &auth).await?;
    let metrics = auth.sessions().metrics().await?;
    Ok(HttpResponse::Ok().json(metrics))
}

#[get("/dao-votes/pending")]
pub async fn pending_dao_votes(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    cookies.authenticate_admin(&req, &auth).await?;
    let pending = reconciler.pending_view().await?;
    Ok(HttpResponse::Ok().json(json!({ "pending_dao_votes": pending })))
}

#[get("/dao-votes/completed")]
pub async fn completed_dao_votes(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    cookies.authenticate_admin(&req, &auth).await?;
    let completed = reconciler.completed_dao_view().await?;
    Ok(HttpResponse::Ok().json(json!({ "completed_dao_votes": completed })))
}

#[get("/dao-votes/all")]
pub async fn all_dao_votes(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    reconciler: web::Data<VoteReconciler>,
) -> Result<HttpResponse, ApiError> {
    cookies.authenticate_admin(&req, &auth).await?;
    let votes = reconciler.dao_overview().await?;
    Ok(HttpResponse::Ok().json(json!({ "dao_votes": votes })))
}

#[get("/dao-votes/voters")]
pub async fn voters(
    req: HttpRequest,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    registry: web::Data<VoterRegistryAdmin>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let voters = registry.voters(identity.role).await?;
    Ok(HttpResponse::Ok().json(json!({ "voters": voters })))
}

#[get("/dao-votes/vote-status")]
pub async fn voter_vote_status(
    req: HttpRequest,
    query: web::Query<VoteStatusQuery>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    registry: web::Data<VoterRegistryAdmin>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let ballot = registry
        .voter_ballot(identity.role, &query.trade_id, &query.voter)
        .await?;
    Ok(HttpResponse::Ok().json(ballot))
}

#[post("/dao-votes/finalize")]
pub async fn finalize_dao_vote(
    req: HttpRequest,
    body: web::Json<FinalizeRequest>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    registry: web::Data<VoterRegistryAdmin>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let summary = registry.finalize_dao_vote(identity.role, &body.trade_id).await?;

    tracing::info!("{} finalized the DAO vote for {}", identity.address, body.trade_id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "DAO vote finalized",
        "result": summary
    })))
}

#[post("/add-voter")]
pub async fn add_voter(
    req: HttpRequest,
    body: web::Json<AddVoterRequest>,
    auth: web::Data<AuthProtocol>,
    cookies: web::Data<SessionCookie>,
    registry: web::Data<VoterRegistryAdmin>,
) -> Result<HttpResponse, ApiError> {
    let identity = cookies.authenticate(&req, &auth).await?;
    let confirmation = registry.add_voter(identity.role, &body.voter).await?;
    Ok(HttpResponse::Ok().json(confirmation))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(check_admin)
            .service(session_metrics)
            .service(pending_dao_votes)
            .service(completed_dao_votes)
            .service(all_dao_votes)
            .service(voters)
            .service(voter_vote_status)
            .service(finalize_dao_vote)
            .service(add_voter),
    );
}
