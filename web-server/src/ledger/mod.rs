// web-server/src/ledger/mod.rs
//! Collaborators that hold vote state.
//!
//! The first-stage vote lives on a chain contract and is only ever read here
//! ([`ChainVoteReader`], [`ContractMetadataSource`]). The second-stage DAO
//! ballot and its voter allow-list are kept by an off-chain registry
//! ([`PendingVoteStore`], [`VoterAllowList`]). Nothing in this module
//! reconciles the two; see `reconciler`.

pub mod memory;

use alloy_primitives::Address;
use async_trait::async_trait;
use common::models::vote::{PendingVoteEntry, TradeMetadata, TradeParties, VoterBallot, VoteStatus};
use common::PlatformError;
use thiserror::Error;

pub use memory::{InMemoryLedger, LedgerFixture};

/// Errors raised by ledger collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The backing chain or store could not answer
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown trade: {0}")]
    NotFound(String),

    /// The ledger refused a write
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<LedgerError> for PlatformError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(msg) => PlatformError::UpstreamUnavailable(msg),
            LedgerError::NotFound(trade_id) => PlatformError::TradeNotFound(trade_id),
            LedgerError::Rejected(msg) => PlatformError::InvalidRequest(msg),
        }
    }
}

/// Read-only view of the first-stage vote contract
#[async_trait]
pub trait ChainVoteReader: Send + Sync {
    /// Every registered trade id, in registration order
    async fn trade_ids(&self) -> Result<Vec<String>, LedgerError>;

    async fn voters(&self, trade_id: &str) -> Result<TradeParties, LedgerError>;

    async fn vote_status(&self, trade_id: &str) -> Result<VoteStatus, LedgerError>;
}

#[async_trait]
pub trait ContractMetadataSource: Send + Sync {
    async fn metadata(&self, trade_id: &str) -> Result<TradeMetadata, LedgerError>;
}

/// Second-stage ballots, one per trade that reached finalization
#[async_trait]
pub trait PendingVoteStore: Send + Sync {
    async fn entries(&self) -> Result<Vec<PendingVoteEntry>, LedgerError>;

    async fn entry(&self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError>;

    /// Close the ballot, recording whether it passed
    async fn finalize(&self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError>;
}

/// Set of addresses allowed to cast DAO ballots
#[async_trait]
pub trait VoterAllowList: Send + Sync {
    /// Returns false when the address was already listed
    async fn add_voter(&self, voter: Address) -> Result<bool, LedgerError>;

    async fn allowed_voters(&self) -> Result<Vec<Address>, LedgerError>;

    async fn voter_ballot(&self, trade_id: &str, voter: &Address) -> Result<VoterBallot, LedgerError>;
}
