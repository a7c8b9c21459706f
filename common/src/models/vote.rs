// common/src/models/vote.rs
use alloy_primitives::Address;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a two-party trade an address is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    A,
    B,
}

/// The two voter addresses registered for a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeParties {
    pub party_a: Address,
    pub party_b: Address,
}

impl TradeParties {
    /// Address comparison is on the 20 raw bytes, so hex case never matters
    pub fn party_of(&self, address: &Address) -> Option<Party> {
        if *address == self.party_a {
            Some(Party::A)
        } else if *address == self.party_b {
            Some(Party::B)
        } else {
            None
        }
    }
}

/// On-chain vote status of a trade.
///
/// The contract returns `(votedA, votedB, approvedA, approvedB, finalized)`;
/// the tuple conversion keeps that ordering in one place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub voted_a: bool,
    pub voted_b: bool,
    pub approved_a: bool,
    pub approved_b: bool,
    pub finalized: bool,
}

impl From<(bool, bool, bool, bool, bool)> for VoteStatus {
    fn from(raw: (bool, bool, bool, bool, bool)) -> Self {
        let (voted_a, voted_b, approved_a, approved_b, finalized) = raw;
        Self {
            voted_a,
            voted_b,
            approved_a,
            approved_b,
            finalized,
        }
    }
}

/// Authoritative per-trade vote view assembled from the chain reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub party_a: Address,
    pub party_b: Address,
    pub voted_a: bool,
    pub voted_b: bool,
    pub approved_a: bool,
    pub approved_b: bool,
    pub finalized: bool,
}

impl VoteRecord {
    pub fn new(trade_id: impl Into<String>, parties: TradeParties, status: VoteStatus) -> Self {
        Self {
            trade_id: trade_id.into(),
            party_a: parties.party_a,
            party_b: parties.party_b,
            voted_a: status.voted_a,
            voted_b: status.voted_b,
            approved_a: status.approved_a,
            approved_b: status.approved_b,
            finalized: status.finalized,
        }
    }

    pub fn parties(&self) -> TradeParties {
        TradeParties {
            party_a: self.party_a,
            party_b: self.party_b,
        }
    }

    pub fn party_of(&self, address: &Address) -> Option<Party> {
        self.parties().party_of(address)
    }

    pub fn has_voted(&self, party: Party) -> bool {
        match party {
            Party::A => self.voted_a,
            Party::B => self.voted_b,
        }
    }

    /// The party's cast vote, `None` while they have not voted
    pub fn approval(&self, party: Party) -> Option<bool> {
        if !self.has_voted(party) {
            return None;
        }
        match party {
            Party::A => Some(self.approved_a),
            Party::B => Some(self.approved_b),
        }
    }

    /// Only a party that has not voted yet may vote, and only before finalization
    pub fn can_vote(&self, address: &Address) -> bool {
        !self.finalized
            && self
                .party_of(address)
                .map(|party| !self.has_voted(party))
                .unwrap_or(false)
    }
}

/// Contract metadata registered alongside a trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMetadata {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub asset_id: String,
    pub registrant: Address,
    /// Registration time, unix seconds
    pub timestamp: i64,
    /// The original document has been archived and can no longer be previewed
    pub file_moved: bool,
}

impl TradeMetadata {
    /// Registration time as `YYYY-MM-DD HH:MM:SS` (UTC)
    pub fn datetime(&self) -> String {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Detail of one trade as shown to a requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeDetail {
    Finalized(FinalizedSummary),
    Open(OpenTradeDetail),
}

impl TradeDetail {
    pub fn can_vote(&self) -> bool {
        match self {
            TradeDetail::Finalized(_) => false,
            TradeDetail::Open(detail) => detail.can_vote,
        }
    }
}

/// Projection of a finalized trade. Asset id and document reference are withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedSummary {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub datetime: String,
    pub approved_a: bool,
    pub approved_b: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTradeDetail {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub asset_id: String,
    pub registrant: Address,
    pub party_a: Address,
    pub party_b: Address,
    pub datetime: String,
    /// Preview location of the contract document, absent once archived
    pub document_url: Option<String>,
    pub voted_a: bool,
    pub voted_b: bool,
    pub approved_a: Option<bool>,
    pub approved_b: Option<bool>,
    pub can_vote: bool,
}

/// Per-user classification of every trade they are party to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVoteView {
    pub eligible: Vec<String>,
    pub completed: Vec<String>,
}

/// Second-stage (DAO) ballot for a trade, as kept by the off-chain store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVoteEntry {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub yes_voters: Vec<Address>,
    pub no_voters: Vec<Address>,
    pub not_voted: Vec<Address>,
    pub dao_processed: bool,
    pub dao_passed: Option<bool>,
}

impl PendingVoteEntry {
    pub fn total_voters(&self) -> usize {
        self.yes_voters.len() + self.no_voters.len() + self.not_voted.len()
    }

    pub fn approve_count(&self) -> usize {
        self.yes_voters.len()
    }
}

/// Admin-facing projection of a DAO ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoVoteSummary {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub approve_count: usize,
    pub total_voters: usize,
    pub dao_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dao_passed: Option<bool>,
    pub yes_voters: Vec<Address>,
    pub no_voters: Vec<Address>,
    pub not_voted: Vec<Address>,
}

impl From<&PendingVoteEntry> for DaoVoteSummary {
    fn from(entry: &PendingVoteEntry) -> Self {
        Self {
            trade_id: entry.trade_id.clone(),
            contract_hash: entry.contract_hash.clone(),
            approve_count: entry.approve_count(),
            total_voters: entry.total_voters(),
            dao_processed: entry.dao_processed,
            // The passed flag only means something once processed
            dao_passed: if entry.dao_processed { entry.dao_passed } else { None },
            yes_voters: entry.yes_voters.clone(),
            no_voters: entry.no_voters.clone(),
            not_voted: entry.not_voted.clone(),
        }
    }
}

/// A finalized trade together with its second-stage state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedTradeView {
    #[serde(rename = "trade_id")]
    pub trade_id: String,
    pub contract_hash: String,
    pub datetime: String,
    pub approved_a: bool,
    pub approved_b: bool,
    pub file_moved: bool,
    pub dao_processed: bool,
    pub dao_passed: Option<bool>,
}

/// One allow-listed voter's ballot on a trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallot {
    pub voted: bool,
    pub approved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn record(status: VoteStatus) -> VoteRecord {
        VoteRecord::new(
            "TRD-1",
            TradeParties {
                party_a: addr(0xaa),
                party_b: addr(0xbb),
            },
            status,
        )
    }

    #[test]
    fn test_status_from_contract_tuple() {
        let status = VoteStatus::from((true, false, true, false, false));
        assert!(status.voted_a);
        assert!(!status.voted_b);
        assert!(status.approved_a);
        assert!(!status.finalized);
    }

    #[test]
    fn test_party_lookup_ignores_hex_case() {
        let parties = TradeParties {
            party_a: "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap(),
            party_b: addr(0xbb),
        };
        let lower: Address = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();

        assert_eq!(parties.party_of(&lower), Some(Party::A));
        assert_eq!(parties.party_of(&addr(0xcc)), None);
    }

    #[test]
    fn test_can_vote_only_for_party_that_has_not_voted() {
        let open = record(VoteStatus::default());
        assert!(open.can_vote(&addr(0xaa)));
        assert!(open.can_vote(&addr(0xbb)));
        assert!(!open.can_vote(&addr(0xcc)));

        let a_voted = record(VoteStatus {
            voted_a: true,
            approved_a: true,
            ..Default::default()
        });
        assert!(!a_voted.can_vote(&addr(0xaa)));
        assert_eq!(a_voted.approval(Party::A), Some(true));
        assert_eq!(a_voted.approval(Party::B), None);
    }

    #[test]
    fn test_metadata_datetime_format() {
        let metadata = TradeMetadata {
            trade_id: "TRD-1".into(),
            contract_hash: "ab".into(),
            asset_id: "asset".into(),
            registrant: addr(0xaa),
            timestamp: 1_700_000_000,
            file_moved: false,
        };
        assert_eq!(metadata.datetime(), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_finalized_detail_has_no_asset_or_document() {
        let detail = TradeDetail::Finalized(FinalizedSummary {
            trade_id: "TRD-1".into(),
            contract_hash: "ab".into(),
            datetime: "2024-01-01 00:00:00".into(),
            approved_a: true,
            approved_b: false,
        });

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "finalized");
        assert_eq!(json["trade_id"], "TRD-1");
        assert!(json.get("assetId").is_none());
        assert!(json.get("documentUrl").is_none());
    }

    #[test]
    fn test_dao_summary_counts() {
        let entry = PendingVoteEntry {
            trade_id: "TRD-1".into(),
            contract_hash: "ab".into(),
            yes_voters: vec![addr(1), addr(2)],
            no_voters: vec![addr(3)],
            not_voted: vec![addr(4), addr(5)],
            dao_processed: false,
            dao_passed: Some(true),
        };

        let summary = DaoVoteSummary::from(&entry);
        assert_eq!(summary.approve_count, 2);
        assert_eq!(summary.total_voters, 5);
        assert!(!summary.dao_processed);
        assert_eq!(summary.dao_passed, None);
    }
}
