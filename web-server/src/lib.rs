// web-server/src/lib.rs
pub mod api;
pub mod auth;
pub mod ledger;
pub mod middleware;
pub mod nonce_store;
pub mod reconciler;
pub mod session_registry;
pub mod static_files;
pub mod utils;
pub mod voter_registry;

use actix::Addr;
use actix_web::web;
use common::Config;
use std::sync::Arc;

use crate::api::SessionCookie;
use crate::auth::{AdminList, AuthProtocol, LandingPages, PersonalSignVerifier, SignatureVerifier};
use crate::ledger::{ChainVoteReader, ContractMetadataSource, PendingVoteStore, VoterAllowList};
use crate::nonce_store::NonceStore;
use crate::reconciler::VoteReconciler;
use crate::session_registry::{SessionManager, SessionRegistryActor};
use crate::voter_registry::VoterRegistryAdmin;

/// Shared handles registered with every worker's `App`
#[derive(Clone)]
pub struct AppState {
    pub nonces: Arc<NonceStore>,
    pub auth: web::Data<AuthProtocol>,
    pub cookies: web::Data<SessionCookie>,
    pub reconciler: web::Data<VoteReconciler>,
    pub voter_registry: web::Data<VoterRegistryAdmin>,
}

impl AppState {
    /// Wire the services over one ledger backend and a running session registry
    pub fn new<L>(config: &Config, ledger: Arc<L>, registry: Addr<SessionRegistryActor>) -> Self
    where
        L: ChainVoteReader + ContractMetadataSource + PendingVoteStore + VoterAllowList + 'static,
    {
        Self::with_verifier(config, ledger, registry, Arc::new(PersonalSignVerifier))
    }

    pub fn with_verifier<L>(
        config: &Config,
        ledger: Arc<L>,
        registry: Addr<SessionRegistryActor>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self
    where
        L: ChainVoteReader + ContractMetadataSource + PendingVoteStore + VoterAllowList + 'static,
    {
        let nonces = Arc::new(NonceStore::new(config.auth.nonce_ttl_seconds));
        let admins = Arc::new(AdminList::from_config(&config.auth.admin_addresses));

        let auth = AuthProtocol::new(nonces.clone(), verifier, SessionManager::new(registry), admins)
            .with_landing(LandingPages {
                user: config.auth.user_landing.clone(),
                admin: config.auth.admin_landing.clone(),
            });

        Self {
            nonces,
            auth: web::Data::new(auth),
            cookies: web::Data::new(SessionCookie::from_config(&config.session)),
            reconciler: web::Data::new(VoteReconciler::from_ledger(ledger.clone())),
            voter_registry: web::Data::new(VoterRegistryAdmin::from_ledger(ledger)),
        }
    }

    /// Register the shared handles and every API route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.auth.clone())
            .app_data(self.cookies.clone())
            .app_data(self.reconciler.clone())
            .app_data(self.voter_registry.clone());
        api::configure(cfg);
    }
}
