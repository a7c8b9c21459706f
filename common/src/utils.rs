// Common Crate - utils.rs
// common/src/utils.rs
use alloy_primitives::Address;
use jsonwebtoken::{encode, decode, Header, Algorithm, Validation, EncodingKey, DecodingKey};
use serde::{Serialize, Deserialize};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::error::PlatformError;
use crate::models::session::{Role, Session};

/// Setup tracing for consistent logging across services
pub fn setup_tracing(level: &str) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Parse a wallet address supplied by a client.
///
/// Accepts `0x` followed by exactly 40 hex digits in any letter case.
pub fn parse_wallet_address(raw: &str) -> Result<Address, PlatformError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlatformError::InvalidAddress("address is empty".to_string()));
    }
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| PlatformError::InvalidAddress(format!("{trimmed}: missing 0x prefix")))?;
    if hex_part.len() != 40 {
        return Err(PlatformError::InvalidAddress(format!(
            "{trimmed}: expected 40 hex digits, got {}",
            hex_part.len()
        )));
    }

    Address::from_str(hex_part)
        .map_err(|e| PlatformError::InvalidAddress(format!("{trimmed}: {e}")))
}

// Session cookie claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,       // wallet address
    pub sid: String,       // server-side session id
    pub role: Role,
    pub exp: usize,        // expiration time
    pub iat: usize,        // issued at time
}

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

/// Wrap a session into the signed cookie credential
pub fn encode_session_token(session: &Session, secret: &[u8], ttl_seconds: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_secs();

    let claims = SessionClaims {
        sub: session.address.to_string(),
        sid: session.session_id.clone(),
        role: session.role,
        iat: now,
        exp: now + ttl_seconds.max(0) as usize,
    };

    encode(
        &Header::new(Algorithm::HS512),
        &claims,
        &EncodingKey::from_secret(secret)
    )
}

/// Validate the cookie credential and extract the session id.
///
/// The token only proves the id was issued by this server; the session
/// registry still decides whether the session is alive.
pub fn decode_session_token(token: &str, secret: &[u8]) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS512);

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation
    )?;

    Ok(token_data.claims)
}
