// common/src/error.rs
use thiserror::Error;

/// Error taxonomy shared by the auth protocol, the reconciler and the API layer.
///
/// Every variant maps to a stable machine-readable code (see [`PlatformError::code`])
/// so transports can surface the kind without parsing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// No live nonce for the address; a new challenge must be issued
    #[error("No live challenge for this address")]
    ChallengeMissing,

    /// Signature did not verify against the address and message
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Valid identity, but not an administrator
    #[error("Address is not an administrator")]
    InsufficientRole,

    /// Missing, expired or revoked session on a protected call
    #[error("Authentication required")]
    Unauthenticated,

    /// Authenticated, but not allowed to perform this action
    #[error("Administrator privileges required")]
    Forbidden,

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Chain or off-chain store unreachable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Trade not found: {0}")]
    TradeNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Stable error code exposed to API clients
    pub fn code(&self) -> &'static str {
        match self {
            PlatformError::ChallengeMissing => "challenge_missing",
            PlatformError::SignatureInvalid => "signature_invalid",
            PlatformError::InsufficientRole => "insufficient_role",
            PlatformError::Unauthenticated => "unauthenticated",
            PlatformError::Forbidden => "forbidden",
            PlatformError::InvalidAddress(_) => "invalid_address",
            PlatformError::UpstreamUnavailable(_) => "upstream_unavailable",
            PlatformError::TradeNotFound(_) => "trade_not_found",
            PlatformError::InvalidRequest(_) => "invalid_request",
            PlatformError::Internal(_) => "internal_error",
        }
    }

    /// True for failures of the login attempt itself. Clients must drop any
    /// cached nonce and session reference before retrying.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            PlatformError::ChallengeMissing
                | PlatformError::SignatureInvalid
                | PlatformError::InsufficientRole
                | PlatformError::Unauthenticated
        )
    }
}
