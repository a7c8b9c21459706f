// web-server/src/voter_registry.rs
//! Administrator operations on the DAO voter allow-list and ballots.
//!
//! Every operation takes the requester's role, already resolved from the
//! session, and refuses non-admins with `Forbidden` before touching anything.

use alloy_primitives::Address;
use common::models::session::Role;
use common::models::vote::{DaoVoteSummary, VoterBallot};
use common::{parse_wallet_address, PlatformError};
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::{PendingVoteStore, VoterAllowList};

/// Confirmation returned by `add_voter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoterAdded {
    pub voter: Address,
    /// False when the voter was already listed
    pub added: bool,
    pub message: String,
}

pub struct VoterRegistryAdmin {
    allow_list: Arc<dyn VoterAllowList>,
    pending: Arc<dyn PendingVoteStore>,
}

impl VoterRegistryAdmin {
    pub fn new(allow_list: Arc<dyn VoterAllowList>, pending: Arc<dyn PendingVoteStore>) -> Self {
        Self { allow_list, pending }
    }

    pub fn from_ledger<L>(ledger: Arc<L>) -> Self
    where
        L: VoterAllowList + PendingVoteStore + 'static,
    {
        Self::new(ledger.clone(), ledger)
    }

    fn require_admin(role: Role) -> Result<(), PlatformError> {
        if role.is_admin() {
            Ok(())
        } else {
            Err(PlatformError::Forbidden)
        }
    }

    /// Add `raw_address` to the allow-list. Adding a listed voter succeeds
    /// without changing anything.
    pub async fn add_voter(&self, requester_role: Role, raw_address: &str) -> Result<VoterAdded, PlatformError> {
        Self::require_admin(requester_role)?;
        let voter = parse_wallet_address(raw_address)?;

        let added = self.allow_list.add_voter(voter).await?;
        if added {
            tracing::info!("Added DAO voter {}", voter);
        } else {
            tracing::info!("DAO voter {} was already listed", voter);
        }

        Ok(VoterAdded {
            voter,
            added,
            message: format!("Voter {voter} added"),
        })
    }

    pub async fn voters(&self, requester_role: Role) -> Result<Vec<Address>, PlatformError> {
        Self::require_admin(requester_role)?;
        Ok(self.allow_list.allowed_voters().await?)
    }

    pub async fn voter_ballot(
        &self,
        requester_role: Role,
        trade_id: &str,
        raw_voter: &str,
    ) -> Result<VoterBallot, PlatformError> {
        Self::require_admin(requester_role)?;
        let voter = parse_wallet_address(raw_voter)?;
        Ok(self.allow_list.voter_ballot(trade_id, &voter).await?)
    }

    /// Close the DAO ballot of a trade. At least one ballot must have been cast.
    pub async fn finalize_dao_vote(&self, requester_role: Role, trade_id: &str) -> Result<DaoVoteSummary, PlatformError> {
        Self::require_admin(requester_role)?;

        let entry = self.pending.entry(trade_id).await?;
        if entry.dao_processed {
            return Err(PlatformError::InvalidRequest(format!(
                "DAO vote for {trade_id} is already finalized"
            )));
        }
        if entry.yes_voters.is_empty() && entry.no_voters.is_empty() {
            return Err(PlatformError::InvalidRequest(format!(
                "No DAO ballots cast for {trade_id} yet"
            )));
        }

        let closed = self.pending.finalize(trade_id).await?;
        tracing::info!(
            "DAO vote for {} finalized, passed: {}",
            trade_id,
            closed.dao_passed.unwrap_or(false)
        );
        Ok(DaoVoteSummary::from(&closed))
    }
}
