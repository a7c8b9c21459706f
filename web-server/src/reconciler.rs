// web-server/src/reconciler.rs
//! Merges on-chain vote state with the off-chain DAO ballots into the views
//! served to users and administrators.
//!
//! Batch reads fan out one lookup per trade and run them concurrently. A trade
//! whose lookup fails is logged and left out; the rest of the batch is still
//! returned. Single-trade reads propagate the failure instead.
//!
//! The DAO `processed` flag and the on-chain `finalized` flag come from
//! different systems and are reported side by side, never cross-checked.

use alloy_primitives::Address;
use common::models::vote::{
    DaoVoteSummary, FinalizedSummary, FinalizedTradeView, OpenTradeDetail, Party, PendingVoteEntry,
    TradeDetail, TradeMetadata, UserVoteView, VoteRecord,
};
use common::PlatformError;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ledger::{ChainVoteReader, ContractMetadataSource, LedgerError, PendingVoteStore};

/// Where the contract document of an open trade can be previewed
const DOCUMENT_VIEW_PATH: &str = "/api/contract/view";

pub struct VoteReconciler {
    chain: Arc<dyn ChainVoteReader>,
    metadata: Arc<dyn ContractMetadataSource>,
    pending: Arc<dyn PendingVoteStore>,
}

impl VoteReconciler {
    pub fn new(
        chain: Arc<dyn ChainVoteReader>,
        metadata: Arc<dyn ContractMetadataSource>,
        pending: Arc<dyn PendingVoteStore>,
    ) -> Self {
        Self {
            chain,
            metadata,
            pending,
        }
    }

    /// Use one backend for every collaborator
    pub fn from_ledger<L>(ledger: Arc<L>) -> Self
    where
        L: ChainVoteReader + ContractMetadataSource + PendingVoteStore + 'static,
    {
        Self::new(ledger.clone(), ledger.clone(), ledger)
    }

    async fn fetch_record(&self, trade_id: &str) -> Result<VoteRecord, LedgerError> {
        let (parties, status) = futures::try_join!(
            self.chain.voters(trade_id),
            self.chain.vote_status(trade_id)
        )?;
        Ok(VoteRecord::new(trade_id, parties, status))
    }

    /// Vote records for every trade, in trade-id order, skipping trades that failed to load
    pub async fn fetch_records(&self) -> Result<Vec<VoteRecord>, PlatformError> {
        let trade_ids = self.chain.trade_ids().await?;
        let results = join_all(trade_ids.iter().map(|trade_id| self.fetch_record(trade_id))).await;

        let records = trade_ids
            .iter()
            .zip(results)
            .filter_map(|(trade_id, result)| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping trade {}: {}", trade_id, e);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    /// Split the trades `requester` is party to into still-to-vote and voted
    pub fn classify(records: &[VoteRecord], requester: &Address) -> UserVoteView {
        let mut view = UserVoteView::default();

        for record in records {
            let Some(party) = record.party_of(requester) else {
                continue;
            };
            if record.has_voted(party) {
                view.completed.push(record.trade_id.clone());
            } else {
                view.eligible.push(record.trade_id.clone());
            }
        }

        view
    }

    pub async fn user_view(&self, requester: &Address) -> Result<UserVoteView, PlatformError> {
        let records = self.fetch_records().await?;
        let view = Self::classify(&records, requester);

        tracing::debug!(
            "Vote view for {}: {} eligible, {} completed",
            requester,
            view.eligible.len(),
            view.completed.len()
        );
        Ok(view)
    }

    /// Project one trade for `requester`.
    ///
    /// Finalized trades only expose the summary; asset id and document
    /// location are withheld.
    pub fn detail(record: &VoteRecord, metadata: &TradeMetadata, requester: &Address) -> TradeDetail {
        if record.finalized {
            return TradeDetail::Finalized(FinalizedSummary {
                trade_id: record.trade_id.clone(),
                contract_hash: metadata.contract_hash.clone(),
                datetime: metadata.datetime(),
                approved_a: record.approved_a,
                approved_b: record.approved_b,
            });
        }

        TradeDetail::Open(OpenTradeDetail {
            trade_id: record.trade_id.clone(),
            contract_hash: metadata.contract_hash.clone(),
            asset_id: metadata.asset_id.clone(),
            registrant: metadata.registrant,
            party_a: record.party_a,
            party_b: record.party_b,
            datetime: metadata.datetime(),
            document_url: (!metadata.file_moved)
                .then(|| format!("{DOCUMENT_VIEW_PATH}?trade_id={}", record.trade_id)),
            voted_a: record.voted_a,
            voted_b: record.voted_b,
            approved_a: record.approval(Party::A),
            approved_b: record.approval(Party::B),
            can_vote: record.can_vote(requester),
        })
    }

    pub async fn describe(&self, trade_id: &str, requester: &Address) -> Result<TradeDetail, PlatformError> {
        let (record, metadata) = futures::try_join!(
            self.fetch_record(trade_id),
            self.metadata.metadata(trade_id)
        )?;
        Ok(Self::detail(&record, &metadata, requester))
    }

    pub async fn trade_status(&self, trade_id: &str) -> Result<VoteRecord, PlatformError> {
        Ok(self.fetch_record(trade_id).await?)
    }

    /// Attach metadata to each record, skipping trades whose metadata failed to load
    async fn with_metadata(&self, records: Vec<VoteRecord>) -> Vec<(VoteRecord, TradeMetadata)> {
        let results = join_all(
            records
                .iter()
                .map(|record| self.metadata.metadata(&record.trade_id)),
        )
        .await;

        records
            .into_iter()
            .zip(results)
            .filter_map(|(record, result)| match result {
                Ok(metadata) => Some((record, metadata)),
                Err(e) => {
                    tracing::warn!("Skipping trade {}: {}", record.trade_id, e);
                    None
                }
            })
            .collect()
    }

    fn finalized_view(
        record: &VoteRecord,
        metadata: &TradeMetadata,
        entry: Option<&PendingVoteEntry>,
    ) -> FinalizedTradeView {
        let dao_processed = entry.map(|e| e.dao_processed).unwrap_or(false);
        FinalizedTradeView {
            trade_id: record.trade_id.clone(),
            contract_hash: metadata.contract_hash.clone(),
            datetime: metadata.datetime(),
            approved_a: record.approved_a,
            approved_b: record.approved_b,
            file_moved: metadata.file_moved,
            dao_processed,
            dao_passed: if dao_processed { entry.and_then(|e| e.dao_passed) } else { None },
        }
    }

    async fn finalized_views<F>(&self, keep: F) -> Result<Vec<FinalizedTradeView>, PlatformError>
    where
        F: Fn(&VoteRecord) -> bool,
    {
        let records: Vec<VoteRecord> = self
            .fetch_records()
            .await?
            .into_iter()
            .filter(|record| record.finalized && keep(record))
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let entries: HashMap<String, PendingVoteEntry> = self
            .pending
            .entries()
            .await?
            .into_iter()
            .map(|entry| (entry.trade_id.clone(), entry))
            .collect();

        Ok(self
            .with_metadata(records)
            .await
            .iter()
            .map(|(record, metadata)| Self::finalized_view(record, metadata, entries.get(&record.trade_id)))
            .collect())
    }

    /// Finalized trades `requester` is party to
    pub async fn finalized_contracts(&self, requester: &Address) -> Result<Vec<FinalizedTradeView>, PlatformError> {
        self.finalized_views(|record| record.party_of(requester).is_some())
            .await
    }

    /// Every finalized trade with its DAO flags
    pub async fn dao_overview(&self) -> Result<Vec<FinalizedTradeView>, PlatformError> {
        self.finalized_views(|_| true).await
    }

    /// DAO ballots still open
    pub async fn pending_view(&self) -> Result<Vec<DaoVoteSummary>, PlatformError> {
        let entries = self.pending.entries().await?;
        Ok(entries
            .iter()
            .filter(|entry| !entry.dao_processed)
            .map(DaoVoteSummary::from)
            .collect())
    }

    /// DAO ballots already closed, with their outcome
    pub async fn completed_dao_view(&self) -> Result<Vec<DaoVoteSummary>, PlatformError> {
        let entries = self.pending.entries().await?;
        Ok(entries
            .iter()
            .filter(|entry| entry.dao_processed)
            .map(DaoVoteSummary::from)
            .collect())
    }
}
