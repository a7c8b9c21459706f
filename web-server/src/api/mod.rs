// web-server/src/api/mod.rs
pub mod admin;
pub mod auth;
pub mod error;
pub mod session_cookie;
pub mod votes;

pub use error::ApiError;
pub use session_cookie::SessionCookie;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    auth::configure(cfg);
    cfg.service(
        actix_web::web::scope("/api")
            .configure(admin::configure)
            .service(votes::votes)
            .service(votes::contract)
            .service(votes::trade_status)
            .service(votes::finalized_contracts),
    );
}
