// common/src/models/session.rs
use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Privilege level attached to a session when it is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Server-side session bound to a verified wallet address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque credential handed to the client
    pub session_id: String,
    /// Wallet address proven at login; never changes for the session's lifetime
    pub address: Address,
    /// Role derived once at creation
    pub role: Role,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: String, address: Address, role: Role) -> Self {
        Self {
            session_id,
            address,
            role,
            created_at: Utc::now(),
        }
    }

    /// Sessions expire a fixed time after login
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        age.num_seconds() >= ttl_seconds
    }

    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            address: self.address,
            role: self.role,
        }
    }
}

/// Who a session belongs to, as seen by protected operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub address: Address,
    pub role: Role,
}

/// Result of session operations
#[derive(Debug, Clone)]
pub enum SessionResult {
    Success(Session),
    NotFound,
    Expired,
}

/// Response structure for whoami and login endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub address: Address,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Landing page after login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    // Omit the session id, it only travels in the cookie
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            address: session.address,
            role: session.role,
            created_at: session.created_at,
            redirect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_expiry_is_absolute() {
        let mut session = Session::new("sid".into(), Address::ZERO, Role::User);
        session.created_at = Utc::now() - Duration::seconds(120);

        assert!(session.is_expired(60));
        assert!(!session.is_expired(600));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        assert_eq!(Role::User.to_string(), "user");
    }
}
