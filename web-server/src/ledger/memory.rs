// web-server/src/ledger/memory.rs
//! In-process ledger.
//!
//! Mirrors the observable surface of the vote contract and the DAO registry:
//! trades are registered with two parties, each party votes once, a trade
//! finalizes when both have voted and that opens its DAO ballot. State can be
//! seeded from a JSON fixture.
//!
//! Outages can be simulated per trade or for the whole ledger, which is how
//! the partial-failure paths of the reconciler are exercised.

use super::{ChainVoteReader, ContractMetadataSource, LedgerError, PendingVoteStore, VoterAllowList};
use alloy_primitives::Address;
use async_trait::async_trait;
use common::models::vote::{
    Party, PendingVoteEntry, TradeMetadata, TradeParties, VoterBallot, VoteStatus,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid fixture: {0}")]
    Invalid(String),
}

/// Seed data for [`InMemoryLedger`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFixture {
    #[serde(default)]
    pub trades: Vec<FixtureTrade>,
    #[serde(default)]
    pub voters: Vec<Address>,
    #[serde(default)]
    pub dao_ballots: Vec<FixtureBallot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTrade {
    pub trade_id: String,
    pub contract_hash: String,
    pub asset_id: String,
    pub registrant: Address,
    pub party_a: Address,
    pub party_b: Address,
    pub timestamp: i64,
    #[serde(default)]
    pub file_moved: bool,
    /// Vote already cast by party A, if any
    #[serde(default)]
    pub vote_a: Option<bool>,
    #[serde(default)]
    pub vote_b: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureBallot {
    pub trade_id: String,
    #[serde(default)]
    pub yes: Vec<Address>,
    #[serde(default)]
    pub no: Vec<Address>,
    #[serde(default)]
    pub processed: bool,
}

impl LedgerFixture {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone)]
struct TradeEntry {
    parties: TradeParties,
    status: VoteStatus,
    metadata: TradeMetadata,
}

#[derive(Debug, Clone, Default)]
struct DaoBallot {
    votes: HashMap<Address, bool>,
    processed: bool,
    passed: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    // Registration order
    order: Vec<String>,
    trades: HashMap<String, TradeEntry>,
    // Allow-list, in the order voters were added
    voters: Vec<Address>,
    ballots: HashMap<String, DaoBallot>,
    failing: HashSet<String>,
    unavailable: bool,
}

impl LedgerState {
    fn check_available(&self, trade_id: Option<&str>) -> Result<(), LedgerError> {
        if self.unavailable {
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }
        match trade_id {
            Some(id) if self.failing.contains(id) => {
                Err(LedgerError::Unavailable(format!("call for trade {id} failed")))
            }
            _ => Ok(()),
        }
    }

    fn trade(&self, trade_id: &str) -> Result<&TradeEntry, LedgerError> {
        self.check_available(Some(trade_id))?;
        self.trades
            .get(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))
    }

    fn register(&mut self, metadata: TradeMetadata, parties: TradeParties) -> Result<(), LedgerError> {
        if self.trades.contains_key(&metadata.trade_id) {
            return Err(LedgerError::Rejected(format!(
                "trade {} already registered",
                metadata.trade_id
            )));
        }
        if parties.party_a == parties.party_b {
            return Err(LedgerError::Rejected("parties must be distinct".to_string()));
        }

        let trade_id = metadata.trade_id.clone();
        self.order.push(trade_id.clone());
        self.trades.insert(
            trade_id,
            TradeEntry {
                parties,
                status: VoteStatus::default(),
                metadata,
            },
        );
        Ok(())
    }

    fn cast_vote(&mut self, trade_id: &str, voter: &Address, approve: bool) -> Result<VoteStatus, LedgerError> {
        let entry = self
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;

        if entry.status.finalized {
            return Err(LedgerError::Rejected(format!("trade {trade_id} is finalized")));
        }

        let status = &mut entry.status;
        match entry.parties.party_of(voter) {
            Some(Party::A) if !status.voted_a => {
                status.voted_a = true;
                status.approved_a = approve;
            }
            Some(Party::B) if !status.voted_b => {
                status.voted_b = true;
                status.approved_b = approve;
            }
            Some(_) => return Err(LedgerError::Rejected(format!("{voter} already voted on {trade_id}"))),
            None => return Err(LedgerError::Rejected(format!("{voter} is not a party to {trade_id}"))),
        }

        if status.voted_a && status.voted_b {
            status.finalized = true;
            self.ballots.entry(trade_id.to_string()).or_default();
            tracing::info!("Trade {} finalized, DAO ballot opened", trade_id);
        }

        Ok(entry.status)
    }

    fn add_voter(&mut self, voter: Address) -> bool {
        if self.voters.contains(&voter) {
            return false;
        }
        self.voters.push(voter);
        true
    }

    fn cast_dao_vote(&mut self, trade_id: &str, voter: &Address, approve: bool) -> Result<(), LedgerError> {
        if !self.voters.contains(voter) {
            return Err(LedgerError::Rejected(format!("{voter} is not a DAO voter")));
        }
        let ballot = self
            .ballots
            .get_mut(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;

        if ballot.processed {
            return Err(LedgerError::Rejected(format!("DAO ballot for {trade_id} is closed")));
        }
        if ballot.votes.contains_key(voter) {
            return Err(LedgerError::Rejected(format!("{voter} already cast a DAO ballot on {trade_id}")));
        }

        ballot.votes.insert(*voter, approve);
        Ok(())
    }

    fn close_ballot(&mut self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError> {
        let ballot = self
            .ballots
            .get_mut(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;

        if ballot.processed {
            return Err(LedgerError::Rejected(format!("DAO ballot for {trade_id} is already closed")));
        }

        let yes = ballot.votes.values().filter(|approved| **approved).count();
        let no = ballot.votes.len() - yes;
        ballot.processed = true;
        ballot.passed = yes > no;

        tracing::info!("DAO ballot for {} closed: {} yes, {} no", trade_id, yes, no);
        self.entry_for(trade_id)
    }

    fn entry_for(&self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError> {
        let ballot = self
            .ballots
            .get(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;
        let contract_hash = self
            .trades
            .get(trade_id)
            .map(|entry| entry.metadata.contract_hash.clone())
            .unwrap_or_default();

        let mut yes_voters = Vec::new();
        let mut no_voters = Vec::new();
        let mut not_voted = Vec::new();
        for voter in &self.voters {
            match ballot.votes.get(voter) {
                Some(true) => yes_voters.push(*voter),
                Some(false) => no_voters.push(*voter),
                None => not_voted.push(*voter),
            }
        }

        Ok(PendingVoteEntry {
            trade_id: trade_id.to_string(),
            contract_hash,
            yes_voters,
            no_voters,
            not_voted,
            dao_processed: ballot.processed,
            dao_passed: ballot.processed.then_some(ballot.passed),
        })
    }

    fn apply_fixture(&mut self, fixture: LedgerFixture) -> Result<(), FixtureError> {
        for voter in fixture.voters {
            self.add_voter(voter);
        }

        for trade in fixture.trades {
            let parties = TradeParties {
                party_a: trade.party_a,
                party_b: trade.party_b,
            };
            let metadata = TradeMetadata {
                trade_id: trade.trade_id.clone(),
                contract_hash: trade.contract_hash,
                asset_id: trade.asset_id,
                registrant: trade.registrant,
                timestamp: trade.timestamp,
                file_moved: trade.file_moved,
            };
            self.register(metadata, parties).map_err(invalid)?;

            if let Some(approve) = trade.vote_a {
                self.cast_vote(&trade.trade_id, &parties.party_a, approve).map_err(invalid)?;
            }
            if let Some(approve) = trade.vote_b {
                self.cast_vote(&trade.trade_id, &parties.party_b, approve).map_err(invalid)?;
            }
        }

        for ballot in fixture.dao_ballots {
            if !self.ballots.contains_key(&ballot.trade_id) {
                return Err(FixtureError::Invalid(format!(
                    "DAO ballot for {} but the trade is not finalized",
                    ballot.trade_id
                )));
            }
            for voter in &ballot.yes {
                self.cast_dao_vote(&ballot.trade_id, voter, true).map_err(invalid)?;
            }
            for voter in &ballot.no {
                self.cast_dao_vote(&ballot.trade_id, voter, false).map_err(invalid)?;
            }
            if ballot.processed {
                self.close_ballot(&ballot.trade_id).map_err(invalid)?;
            }
        }

        Ok(())
    }
}

fn invalid(err: LedgerError) -> FixtureError {
    FixtureError::Invalid(err.to_string())
}

/// Vote contract, DAO registry and allow-list held in memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: LedgerFixture) -> Result<Self, FixtureError> {
        let mut state = LedgerState::default();
        state.apply_fixture(fixture)?;

        tracing::info!(
            "Ledger seeded with {} trades and {} DAO voters",
            state.order.len(),
            state.voters.len()
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_fixture(LedgerFixture::from_file(path)?)
    }

    pub async fn register_trade(&self, metadata: TradeMetadata, parties: TradeParties) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.check_available(None)?;
        state.register(metadata, parties)
    }

    /// First-stage vote by one of the trade's parties
    pub async fn cast_vote(&self, trade_id: &str, voter: &Address, approve: bool) -> Result<VoteStatus, LedgerError> {
        let mut state = self.state.write().await;
        state.check_available(Some(trade_id))?;
        state.cast_vote(trade_id, voter, approve)
    }

    /// Second-stage vote by an allow-listed voter
    pub async fn cast_dao_vote(&self, trade_id: &str, voter: &Address, approve: bool) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.check_available(Some(trade_id))?;
        state.cast_dao_vote(trade_id, voter, approve)
    }

    /// Record that the contract document was archived
    pub async fn mark_file_moved(&self, trade_id: &str) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        state.check_available(Some(trade_id))?;
        let entry = state
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| LedgerError::NotFound(trade_id.to_string()))?;
        entry.metadata.file_moved = true;
        Ok(())
    }

    /// Make every call touching `trade_id` fail as unavailable
    pub async fn fail_trade(&self, trade_id: &str) {
        self.state.write().await.failing.insert(trade_id.to_string());
    }

    pub async fn set_available(&self, available: bool) {
        self.state.write().await.unavailable = !available;
    }
}

#[async_trait]
impl ChainVoteReader for InMemoryLedger {
    async fn trade_ids(&self) -> Result<Vec<String>, LedgerError> {
        let state = self.state.read().await;
        state.check_available(None)?;
        Ok(state.order.clone())
    }

    async fn voters(&self, trade_id: &str) -> Result<TradeParties, LedgerError> {
        let state = self.state.read().await;
        Ok(state.trade(trade_id)?.parties)
    }

    async fn vote_status(&self, trade_id: &str) -> Result<VoteStatus, LedgerError> {
        let state = self.state.read().await;
        Ok(state.trade(trade_id)?.status)
    }
}

#[async_trait]
impl ContractMetadataSource for InMemoryLedger {
    async fn metadata(&self, trade_id: &str) -> Result<TradeMetadata, LedgerError> {
        let state = self.state.read().await;
        Ok(state.trade(trade_id)?.metadata.clone())
    }
}

#[async_trait]
impl PendingVoteStore for InMemoryLedger {
    async fn entries(&self) -> Result<Vec<PendingVoteEntry>, LedgerError> {
        let state = self.state.read().await;
        state.check_available(None)?;

        state
            .order
            .iter()
            .filter(|trade_id| state.ballots.contains_key(*trade_id))
            .map(|trade_id| state.entry_for(trade_id))
            .collect()
    }

    async fn entry(&self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError> {
        let state = self.state.read().await;
        state.check_available(Some(trade_id))?;
        state.entry_for(trade_id)
    }

    async fn finalize(&self, trade_id: &str) -> Result<PendingVoteEntry, LedgerError> {
        let mut state = self.state.write().await;
        state.check_available(Some(trade_id))?;
        state.close_ballot(trade_id)
    }
}

#[async_trait]
impl VoterAllowList for InMemoryLedger {
    async fn add_voter(&self, voter: Address) -> Result<bool, LedgerError> {
        // Check and insert under one write lock
        let mut state = self.state.write().await;
        state.check_available(None)?;
        Ok(state.add_voter(voter))
    }

    async fn allowed_voters(&self) -> Result<Vec<Address>, LedgerError> {
        let state = self.state.read().await;
        state.check_available(None)?;
        Ok(state.voters.clone())
    }

    async fn voter_ballot(&self, trade_id: &str, voter: &Address) -> Result<VoterBallot, LedgerError> {
        let state = self.state.read().await;
        state.trade(trade_id)?;

        let ballot = state
            .ballots
            .get(trade_id)
            .and_then(|ballot| ballot.votes.get(voter))
            .map(|approved| VoterBallot {
                voted: true,
                approved: *approved,
            })
            .unwrap_or_default();
        Ok(ballot)
    }
}
