// web-server/src/auth/roles.rs
use alloy_primitives::Address;
use common::models::session::Role;
use common::parse_wallet_address;
use std::collections::HashSet;

/// Administrator allow-list consulted once per login
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<Address>,
}

impl AdminList {
    pub fn new(admins: impl IntoIterator<Item = Address>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Build from configured address strings, skipping malformed entries
    pub fn from_config(raw: &[String]) -> Self {
        let admins = raw
            .iter()
            .filter_map(|entry| match parse_wallet_address(entry) {
                Ok(address) => Some(address),
                Err(e) => {
                    tracing::warn!("Ignoring admin entry: {}", e);
                    None
                }
            })
            .collect::<HashSet<_>>();

        tracing::info!("Loaded {} admin addresses", admins.len());
        Self { admins }
    }

    pub fn is_admin(&self, address: &Address) -> bool {
        self.admins.contains(address)
    }

    pub fn role_for(&self, address: &Address) -> Role {
        if self.is_admin(address) {
            Role::Admin
        } else {
            Role::User
        }
    }
}
