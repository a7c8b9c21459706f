// web-server/src/auth/protocol.rs
//! Challenge-response login.
//!
//! A login attempt moves through
//! `Start -> NonceIssued -> SignatureVerified -> SessionEstablished -> RoleChecked`;
//! any step can end the attempt with an error, which is its failed state.

use alloy_primitives::Address;
use common::models::session::{Role, Session, SessionIdentity};
use common::{PlatformError, WalletEvent};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::roles::AdminList;
use super::verifier::SignatureVerifier;
use crate::nonce_store::NonceStore;
use crate::session_registry::SessionManager;

/// Literal text placed in front of the nonce in the message the wallet signs
pub const SIGN_MESSAGE_PREFIX: &str = "Sign this message: ";

/// The exact message a wallet must sign for `nonce`
pub fn signing_message(nonce: &str) -> String {
    format!("{SIGN_MESSAGE_PREFIX}{nonce}")
}

/// Challenge handed to the client by `begin_login`
#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub address: Address,
    pub nonce: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// Any verified wallet gets a session
    Standard,
    /// Only administrators complete the login
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Start,
    NonceIssued,
    SignatureVerified,
    SessionEstablished,
    RoleChecked(Role),
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginStage::Start => write!(f, "start"),
            LoginStage::NonceIssued => write!(f, "nonce_issued"),
            LoginStage::SignatureVerified => write!(f, "signature_verified"),
            LoginStage::SessionEstablished => write!(f, "session_established"),
            LoginStage::RoleChecked(role) => write!(f, "role_checked({role})"),
        }
    }
}

/// Where to send the client after a successful login
#[derive(Debug, Clone)]
pub struct LandingPages {
    pub user: String,
    pub admin: String,
}

impl Default for LandingPages {
    fn default() -> Self {
        Self {
            user: "/static/register.html".to_string(),
            admin: "/static/admin.html".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    /// Terminal success stage reached
    pub stage: LoginStage,
    pub redirect_to: String,
}

pub struct AuthProtocol {
    nonces: Arc<NonceStore>,
    verifier: Arc<dyn SignatureVerifier>,
    sessions: SessionManager,
    admins: Arc<AdminList>,
    landing: LandingPages,
}

impl AuthProtocol {
    pub fn new(
        nonces: Arc<NonceStore>,
        verifier: Arc<dyn SignatureVerifier>,
        sessions: SessionManager,
        admins: Arc<AdminList>,
    ) -> Self {
        Self {
            nonces,
            verifier,
            sessions,
            admins,
            landing: LandingPages::default(),
        }
    }

    pub fn with_landing(mut self, landing: LandingPages) -> Self {
        self.landing = landing;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Issue (or re-issue) the challenge for `address`.
    ///
    /// A session the caller still holds is dropped first. Failing to drop it
    /// does not stop the new attempt.
    pub async fn begin_login(&self, address: Address, existing_session: Option<&str>) -> Challenge {
        if let Some(session_id) = existing_session {
            match self.sessions.invalidate(session_id).await {
                Ok(true) => tracing::debug!("Dropped previous session before login for {}", address),
                Ok(false) => {}
                Err(e) => tracing::warn!("Could not drop previous session for {}: {}", address, e),
            }
        }

        let nonce = self.nonces.issue(address);
        tracing::debug!("Login for {} reached {}", address, LoginStage::NonceIssued);

        Challenge {
            address,
            message: signing_message(&nonce.value),
            nonce: nonce.value,
        }
    }

    /// Verify the wallet's signature over the live challenge and open a session
    pub async fn complete_login(
        &self,
        address: Address,
        signature: &str,
        mode: LoginMode,
    ) -> Result<LoginOutcome, PlatformError> {
        // The nonce is spent here, whether or not the rest succeeds
        let nonce = self
            .nonces
            .consume(&address)
            .map_err(|e| self.fail(&address, LoginStage::Start, e))?;

        let message = signing_message(&nonce.value);
        if !self.verifier.verify(&address, &message, signature).await {
            return Err(self.fail(&address, LoginStage::NonceIssued, PlatformError::SignatureInvalid));
        }
        tracing::debug!("Login for {} reached {}", address, LoginStage::SignatureVerified);

        let role = self.admins.role_for(&address);
        let session = self
            .sessions
            .create(address, role)
            .await
            .map_err(|e| self.fail(&address, LoginStage::SignatureVerified, e))?;

        match mode {
            LoginMode::Standard => {
                tracing::info!("Login completed for {} as {}", address, role);
                Ok(LoginOutcome {
                    session,
                    stage: LoginStage::SessionEstablished,
                    redirect_to: self.landing.user.clone(),
                })
            }
            LoginMode::Admin if role.is_admin() => {
                tracing::info!("Admin login completed for {}", address);
                Ok(LoginOutcome {
                    session,
                    stage: LoginStage::RoleChecked(Role::Admin),
                    redirect_to: self.landing.admin.clone(),
                })
            }
            LoginMode::Admin => {
                // Do not leave a half-granted session behind a failed admin login
                if let Err(e) = self.sessions.invalidate(&session.session_id).await {
                    tracing::warn!("Could not drop session after failed admin login: {}", e);
                }
                Err(self.fail(&address, LoginStage::SessionEstablished, PlatformError::InsufficientRole))
            }
        }
    }

    /// Resolve a session credential; the entry point of every protected call
    pub async fn resolve(&self, session_id: &str) -> Result<SessionIdentity, PlatformError> {
        self.sessions.resolve(session_id).await
    }

    /// Resolve and require the admin role
    pub async fn require_admin(&self, session_id: &str) -> Result<SessionIdentity, PlatformError> {
        let identity = self.sessions.resolve(session_id).await?;
        if !identity.role.is_admin() {
            tracing::warn!("Admin action refused for {}", identity.address);
            return Err(PlatformError::Forbidden);
        }
        Ok(identity)
    }

    /// Idempotent logout
    pub async fn logout(&self, session_id: &str) -> Result<(), PlatformError> {
        self.sessions.invalidate(session_id).await.map(|_| ())
    }

    /// React to a wallet notification: drop the session and any cached challenge
    pub async fn on_wallet_event(&self, event: WalletEvent) -> Result<bool, PlatformError> {
        let bound = self.sessions.resolve(event.session_id()).await.ok();

        let dropped = self.sessions.notify(event).await?;
        if dropped {
            if let Some(identity) = bound {
                self.nonces.discard(&identity.address);
            }
        }

        Ok(dropped)
    }

    fn fail(&self, address: &Address, reached: LoginStage, error: PlatformError) -> PlatformError {
        tracing::warn!("Login for {} failed after {}: {}", address, reached, error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::PersonalSignVerifier;
    use crate::session_registry::SessionRegistryActor;
    use actix::Actor;
    use alloy_primitives::B256;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    fn signer(byte: u8) -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&B256::from([byte; 32])).expect("valid secret")
    }

    fn sign(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", hex::encode(signature.as_bytes()))
    }

    fn protocol(admins: Vec<Address>) -> AuthProtocol {
        AuthProtocol::new(
            Arc::new(NonceStore::new(300)),
            Arc::new(PersonalSignVerifier),
            SessionManager::new(SessionRegistryActor::new().start()),
            Arc::new(AdminList::new(admins)),
        )
    }

    #[test]
    fn test_signing_message_format() {
        assert_eq!(signing_message("ab12"), "Sign this message: ab12");
    }

    #[actix_web::test]
    async fn test_login_round_trip() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        assert_eq!(challenge.message, format!("Sign this message: {}", challenge.nonce));

        let outcome = auth
            .complete_login(wallet.address(), &sign(&wallet, &challenge.message), LoginMode::Standard)
            .await
            .unwrap();
        assert_eq!(outcome.stage, LoginStage::SessionEstablished);
        assert_eq!(outcome.redirect_to, "/static/register.html");

        let identity = auth.resolve(&outcome.session.session_id).await.unwrap();
        assert_eq!(identity.address, wallet.address());
        assert_eq!(identity.role, Role::User);
    }

    #[actix_web::test]
    async fn test_repeated_challenge_is_same_nonce() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let first = auth.begin_login(wallet.address(), None).await;
        let second = auth.begin_login(wallet.address(), None).await;
        assert_eq!(first.nonce, second.nonce);
    }

    #[actix_web::test]
    async fn test_replay_fails_with_challenge_missing() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        let signature = sign(&wallet, &challenge.message);

        auth.complete_login(wallet.address(), &signature, LoginMode::Standard)
            .await
            .unwrap();
        let replay = auth
            .complete_login(wallet.address(), &signature, LoginMode::Standard)
            .await;
        assert_eq!(replay.unwrap_err(), PlatformError::ChallengeMissing);
    }

    #[actix_web::test]
    async fn test_bad_signature_spends_the_nonce() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;

        // Signed the bare nonce, without the prefix
        let wrong = sign(&wallet, &challenge.nonce);
        let result = auth.complete_login(wallet.address(), &wrong, LoginMode::Standard).await;
        assert_eq!(result.unwrap_err(), PlatformError::SignatureInvalid);

        // A correct signature over the old challenge no longer helps
        let right = sign(&wallet, &challenge.message);
        let retry = auth.complete_login(wallet.address(), &right, LoginMode::Standard).await;
        assert_eq!(retry.unwrap_err(), PlatformError::ChallengeMissing);
    }

    #[actix_web::test]
    async fn test_login_without_challenge() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let result = auth
            .complete_login(wallet.address(), &sign(&wallet, "Sign this message: x"), LoginMode::Standard)
            .await;
        assert_eq!(result.unwrap_err(), PlatformError::ChallengeMissing);
    }

    #[actix_web::test]
    async fn test_concurrent_completion_has_one_winner() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        let signature = sign(&wallet, &challenge.message);

        let (first, second) = futures::join!(
            auth.complete_login(wallet.address(), &signature, LoginMode::Standard),
            auth.complete_login(wallet.address(), &signature, LoginMode::Standard),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(PlatformError::ChallengeMissing))));
    }

    #[actix_web::test]
    async fn test_admin_login() {
        let admin = signer(0x21);
        let auth = protocol(vec![admin.address()]);

        let challenge = auth.begin_login(admin.address(), None).await;
        let outcome = auth
            .complete_login(admin.address(), &sign(&admin, &challenge.message), LoginMode::Admin)
            .await
            .unwrap();

        assert_eq!(outcome.stage, LoginStage::RoleChecked(Role::Admin));
        assert_eq!(outcome.redirect_to, "/static/admin.html");
        assert!(auth.require_admin(&outcome.session.session_id).await.is_ok());
    }

    #[actix_web::test]
    async fn test_admin_login_by_user_is_insufficient_role() {
        let user = signer(0x11);
        let auth = protocol(vec![Address::repeat_byte(0x99)]);

        let challenge = auth.begin_login(user.address(), None).await;
        let result = auth
            .complete_login(user.address(), &sign(&user, &challenge.message), LoginMode::Admin)
            .await;

        assert_eq!(result.unwrap_err(), PlatformError::InsufficientRole);
        let metrics = auth.sessions().metrics().await.unwrap();
        assert_eq!(metrics.total_sessions, 0);
    }

    #[actix_web::test]
    async fn test_user_session_cannot_act_as_admin() {
        let user = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(user.address(), None).await;
        let outcome = auth
            .complete_login(user.address(), &sign(&user, &challenge.message), LoginMode::Standard)
            .await
            .unwrap();

        assert_eq!(
            auth.require_admin(&outcome.session.session_id).await.unwrap_err(),
            PlatformError::Forbidden
        );
    }

    #[actix_web::test]
    async fn test_begin_login_drops_previous_session() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        let outcome = auth
            .complete_login(wallet.address(), &sign(&wallet, &challenge.message), LoginMode::Standard)
            .await
            .unwrap();

        auth.begin_login(wallet.address(), Some(&outcome.session.session_id)).await;
        assert_eq!(
            auth.resolve(&outcome.session.session_id).await.unwrap_err(),
            PlatformError::Unauthenticated
        );

        // Unknown previous session is ignored
        auth.begin_login(wallet.address(), Some("no-such-session")).await;
    }

    #[actix_web::test]
    async fn test_logout_is_idempotent() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        let outcome = auth
            .complete_login(wallet.address(), &sign(&wallet, &challenge.message), LoginMode::Standard)
            .await
            .unwrap();

        auth.logout(&outcome.session.session_id).await.unwrap();
        auth.logout(&outcome.session.session_id).await.unwrap();
        assert_eq!(
            auth.resolve(&outcome.session.session_id).await.unwrap_err(),
            PlatformError::Unauthenticated
        );
    }

    #[actix_web::test]
    async fn test_account_change_drops_session_and_cached_challenge() {
        let wallet = signer(0x11);
        let auth = protocol(vec![]);

        let challenge = auth.begin_login(wallet.address(), None).await;
        let outcome = auth
            .complete_login(wallet.address(), &sign(&wallet, &challenge.message), LoginMode::Standard)
            .await
            .unwrap();
        let pending = auth.begin_login(wallet.address(), None).await;

        let dropped = auth
            .on_wallet_event(WalletEvent::AccountsChanged {
                session_id: outcome.session.session_id.clone(),
                accounts: vec![Address::repeat_byte(0x44).to_string()],
            })
            .await
            .unwrap();
        assert!(dropped);
        assert!(auth.resolve(&outcome.session.session_id).await.is_err());

        let fresh = auth.begin_login(wallet.address(), None).await;
        assert_ne!(pending.nonce, fresh.nonce);
    }
}
