// Common Crate - messages.rs
// common/src/messages.rs
use actix::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification raised by the wallet on the client side and relayed to the server.
///
/// Any of these means the session bound to `session_id` no longer reflects the
/// account the wallet is signing with.
#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[rtype(result = "bool")]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WalletEvent {
    /// The wallet switched accounts; `accounts[0]` is the newly active one
    AccountsChanged {
        session_id: String,
        accounts: Vec<String>,
    },
    /// The wallet disconnected from the site
    Disconnected {
        session_id: String,
    },
}

impl WalletEvent {
    pub fn session_id(&self) -> &str {
        match self {
            WalletEvent::AccountsChanged { session_id, .. } => session_id,
            WalletEvent::Disconnected { session_id } => session_id,
        }
    }
}
