// web-server/src/session_registry.rs
use actix::{Actor, Addr, AsyncContext, Context, Handler, Message, MessageResult};
use alloy_primitives::Address;
use chrono::Utc;
use common::models::session::{Role, Session, SessionIdentity, SessionResult};
use common::{parse_wallet_address, PlatformError, WalletEvent};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::token::generate_session_id;

// Default session TTL in seconds (30 minutes)
const DEFAULT_SESSION_TTL: i64 = 1800;

/// Actor message: Create a session for a verified address
#[derive(Message)]
#[rtype(result = "Session")]
pub struct CreateSession {
    pub address: Address,
    pub role: Role,
}

/// Actor message: Look up a session by id
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct ResolveSession {
    pub session_id: String,
}

/// Actor message: Invalidate/remove a session
#[derive(Message)]
#[rtype(result = "bool")]
pub struct InvalidateSession {
    pub session_id: String,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Actor message: Get session metrics
#[derive(Message)]
#[rtype(result = "SessionMetrics")]
pub struct GetSessionMetrics;

/// Session metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMetrics {
    pub total_sessions: usize,
    pub user_sessions: usize,
    pub admin_sessions: usize,
    pub expired_count: usize,
    pub invalidated_count: usize,
    pub avg_session_age_seconds: f64,
}

/// SessionRegistryActor owns every live session
pub struct SessionRegistryActor {
    // Map from session id to session data
    sessions: Arc<DashMap<String, Session>>,
    // Session TTL in seconds
    session_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
    // Metrics
    metrics: SessionMetrics,
}

impl Default for SessionRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistryActor {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            cleanup_interval: 300,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds;
        self
    }

    /// Update session metrics
    fn update_metrics(&mut self) {
        let mut user_count = 0;
        let mut admin_count = 0;
        let mut age_sum = 0.0;
        let now = Utc::now();

        for entry in self.sessions.iter() {
            let session = entry.value();
            match session.role {
                Role::Admin => admin_count += 1,
                Role::User => user_count += 1,
            }

            // Calculate session age in seconds
            age_sum += now.signed_duration_since(session.created_at).num_seconds() as f64;
        }

        let total = user_count + admin_count;

        self.metrics.total_sessions = total;
        self.metrics.user_sessions = user_count;
        self.metrics.admin_sessions = admin_count;
        self.metrics.avg_session_age_seconds = if total > 0 { age_sum / total as f64 } else { 0.0 };
    }

    /// Remove expired sessions and update metrics
    fn cleanup_sessions(&mut self) -> usize {
        let ttl = self.session_ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(ttl));
        let expired_count = before - self.sessions.len();

        self.metrics.expired_count += expired_count;
        self.update_metrics();

        expired_count
    }

    fn remove_session(&mut self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                self.metrics.invalidated_count += 1;
                tracing::info!("Invalidated session for {}", session.address);
                true
            }
            None => false,
        }
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionRegistryActor started with TTL: {}s", self.session_ttl);

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired_count);
            }
            tracing::debug!(
                "Sessions: {} live ({} admin), {} expired, {} invalidated, avg age {:.0}s",
                act.metrics.total_sessions,
                act.metrics.admin_sessions,
                act.metrics.expired_count,
                act.metrics.invalidated_count,
                act.metrics.avg_session_age_seconds
            );
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "SessionRegistryActor stopped. {} sessions expired and {} invalidated during lifetime",
            self.metrics.expired_count,
            self.metrics.invalidated_count
        );
    }
}

// Handle creation of a new session
impl Handler<CreateSession> for SessionRegistryActor {
    type Result = MessageResult<CreateSession>;

    fn handle(&mut self, msg: CreateSession, _ctx: &mut Self::Context) -> Self::Result {
        // Never hand out an id that is already bound to a session
        let mut session_id = generate_session_id(&msg.address);
        while self.sessions.contains_key(&session_id) {
            session_id = generate_session_id(&msg.address);
        }

        let session = Session::new(session_id.clone(), msg.address, msg.role);
        self.sessions.insert(session_id, session.clone());

        tracing::info!("Created {} session for {}", session.role, session.address);

        MessageResult(session)
    }
}

// Handle retrieval of a session by id
impl Handler<ResolveSession> for SessionRegistryActor {
    type Result = MessageResult<ResolveSession>;

    fn handle(&mut self, msg: ResolveSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = if let Some(entry) = self.sessions.get(&msg.session_id) {
            let session = entry.value();

            // Check if session has expired
            if session.is_expired(self.session_ttl) {
                tracing::debug!("Session expired for {}", session.address);
                SessionResult::Expired
            } else {
                tracing::debug!("Resolved session for {}", session.address);
                SessionResult::Success(session.clone())
            }
        } else {
            tracing::debug!("Session not found");
            SessionResult::NotFound
        };

        MessageResult(result)
    }
}

// Handle session invalidation
impl Handler<InvalidateSession> for SessionRegistryActor {
    type Result = bool;

    fn handle(&mut self, msg: InvalidateSession, _ctx: &mut Self::Context) -> Self::Result {
        self.remove_session(&msg.session_id)
    }
}

// Handle wallet notifications relayed from the client
impl Handler<WalletEvent> for SessionRegistryActor {
    type Result = bool;

    fn handle(&mut self, msg: WalletEvent, _ctx: &mut Self::Context) -> Self::Result {
        let bound_address = match self.sessions.get(msg.session_id()) {
            Some(entry) => entry.value().address,
            None => return false,
        };

        let still_active = match &msg {
            WalletEvent::AccountsChanged { accounts, .. } => accounts
                .first()
                .and_then(|raw| parse_wallet_address(raw).ok())
                .map(|active| active == bound_address)
                .unwrap_or(false),
            WalletEvent::Disconnected { .. } => false,
        };

        if still_active {
            tracing::debug!("Wallet event for {} kept the same account", bound_address);
            return false;
        }

        tracing::info!("Wallet account changed away from {}", bound_address);
        self.remove_session(msg.session_id())
    }
}

// Handle session cleanup
impl Handler<CleanupExpiredSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_sessions();
        tracing::info!("Cleaned up {} expired sessions", expired_count);
        MessageResult(expired_count)
    }
}

// Handle metrics request
impl Handler<GetSessionMetrics> for SessionRegistryActor {
    type Result = MessageResult<GetSessionMetrics>;

    fn handle(&mut self, _msg: GetSessionMetrics, _ctx: &mut Self::Context) -> Self::Result {
        // Update metrics before returning
        self.update_metrics();
        MessageResult(self.metrics.clone())
    }
}

/// Async facade over the registry actor used by the auth protocol and handlers
#[derive(Clone)]
pub struct SessionManager {
    registry: Addr<SessionRegistryActor>,
}

impl SessionManager {
    pub fn new(registry: Addr<SessionRegistryActor>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Addr<SessionRegistryActor> {
        &self.registry
    }

    /// Create a fresh session; never reuses an old id
    pub async fn create(&self, address: Address, role: Role) -> Result<Session, PlatformError> {
        self.registry
            .send(CreateSession { address, role })
            .await
            .map_err(|e| PlatformError::Internal(format!("session registry unavailable: {e}")))
    }

    /// Resolve a session id to its identity
    pub async fn resolve(&self, session_id: &str) -> Result<SessionIdentity, PlatformError> {
        let result = self
            .registry
            .send(ResolveSession { session_id: session_id.to_string() })
            .await
            .map_err(|e| PlatformError::Internal(format!("session registry unavailable: {e}")))?;

        match result {
            SessionResult::Success(session) => Ok(session.identity()),
            SessionResult::Expired | SessionResult::NotFound => Err(PlatformError::Unauthenticated),
        }
    }

    /// Remove a session. Unknown ids are not an error.
    pub async fn invalidate(&self, session_id: &str) -> Result<bool, PlatformError> {
        self.registry
            .send(InvalidateSession { session_id: session_id.to_string() })
            .await
            .map_err(|e| PlatformError::Internal(format!("session registry unavailable: {e}")))
    }

    /// Forward a wallet notification; returns whether a session was dropped
    pub async fn notify(&self, event: WalletEvent) -> Result<bool, PlatformError> {
        self.registry
            .send(event)
            .await
            .map_err(|e| PlatformError::Internal(format!("session registry unavailable: {e}")))
    }

    pub async fn metrics(&self) -> Result<SessionMetrics, PlatformError> {
        self.registry
            .send(GetSessionMetrics)
            .await
            .map_err(|e| PlatformError::Internal(format!("session registry unavailable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(SessionRegistryActor::new().start())
    }

    #[actix_web::test]
    async fn test_create_then_resolve() {
        let sessions = manager();
        let address = Address::repeat_byte(0x11);

        let session = sessions.create(address, Role::User).await.unwrap();
        let identity = sessions.resolve(&session.session_id).await.unwrap();

        assert_eq!(identity.address, address);
        assert_eq!(identity.role, Role::User);
    }

    #[actix_web::test]
    async fn test_invalidated_session_is_unauthenticated() {
        let sessions = manager();
        let session = sessions.create(Address::repeat_byte(0x11), Role::Admin).await.unwrap();

        assert!(sessions.invalidate(&session.session_id).await.unwrap());
        assert_eq!(
            sessions.resolve(&session.session_id).await,
            Err(PlatformError::Unauthenticated)
        );
        // Idempotent
        assert!(!sessions.invalidate(&session.session_id).await.unwrap());
    }

    #[actix_web::test]
    async fn test_create_never_reuses_ids() {
        let sessions = manager();
        let address = Address::repeat_byte(0x22);

        let first = sessions.create(address, Role::User).await.unwrap();
        let second = sessions.create(address, Role::User).await.unwrap();
        assert_ne!(first.session_id, second.session_id);
    }

    #[actix_web::test]
    async fn test_expired_session_is_unauthenticated() {
        let sessions = SessionManager::new(SessionRegistryActor::new().with_ttl(0).start());
        let session = sessions.create(Address::repeat_byte(0x11), Role::User).await.unwrap();

        assert_eq!(
            sessions.resolve(&session.session_id).await,
            Err(PlatformError::Unauthenticated)
        );
        let expired = sessions.registry().send(CleanupExpiredSessions).await.unwrap();
        assert_eq!(expired, 1);
    }

    #[actix_web::test]
    async fn test_account_change_drops_session() {
        let sessions = manager();
        let address = Address::repeat_byte(0x11);
        let session = sessions.create(address, Role::User).await.unwrap();

        // Same account reported again: session survives
        let same = WalletEvent::AccountsChanged {
            session_id: session.session_id.clone(),
            accounts: vec![address.to_string().to_lowercase()],
        };
        assert!(!sessions.notify(same).await.unwrap());
        assert!(sessions.resolve(&session.session_id).await.is_ok());

        let switched = WalletEvent::AccountsChanged {
            session_id: session.session_id.clone(),
            accounts: vec![Address::repeat_byte(0x33).to_string()],
        };
        assert!(sessions.notify(switched).await.unwrap());
        assert_eq!(
            sessions.resolve(&session.session_id).await,
            Err(PlatformError::Unauthenticated)
        );
    }

    #[actix_web::test]
    async fn test_resolve_leaves_session_untouched() {
        let sessions = manager();
        let session = sessions.create(Address::repeat_byte(0x11), Role::User).await.unwrap();

        for _ in 0..3 {
            let result = sessions
                .registry()
                .send(ResolveSession { session_id: session.session_id.clone() })
                .await
                .unwrap();
            let SessionResult::Success(stored) = result else {
                panic!("session should resolve");
            };
            assert_eq!(stored.created_at, session.created_at);
            assert_eq!(stored.role, session.role);
        }

        let metrics = sessions.metrics().await.unwrap();
        assert_eq!(metrics.total_sessions, 1);
        assert_eq!(metrics.invalidated_count, 0);
    }

    #[actix_web::test]
    async fn test_metrics_count_roles() {
        let sessions = manager();
        sessions.create(Address::repeat_byte(1), Role::User).await.unwrap();
        sessions.create(Address::repeat_byte(2), Role::Admin).await.unwrap();

        let metrics = sessions.metrics().await.unwrap();
        assert_eq!(metrics.total_sessions, 2);
        assert_eq!(metrics.admin_sessions, 1);
    }
}
