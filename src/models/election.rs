use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of an election. The backend owns transitions; the client
/// only gates its controls on the last value the server reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    Upcoming,
    Open,
    Closed,
}

impl ElectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionStatus::Upcoming => "upcoming",
            ElectionStatus::Open => "open",
            ElectionStatus::Closed => "closed",
        }
    }
}

/// Which voters are charged tokens when the election resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOption {
    #[serde(rename = "allpay")]
    AllPay,
    #[serde(rename = "winnerspay")]
    WinnersPay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    MostVotes,
    Lottery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub election_id: String,
    pub group_id: String,
    pub election_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionStatus,
    pub payment_options: PaymentOption,
    /// Ordered price tiers, e.g. "1,2" for first-price then second-price.
    pub price_options: String,
    pub resolution_strategy: ResolutionStrategy,
    pub winning_proposal_id: Option<String>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: String,
    pub election_id: String,
    pub proposer_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Populated by the server only once the election is closed.
    #[serde(default)]
    pub votes: Vec<Vote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub vote_id: String,
    pub election_id: String,
    pub membership_id: String,
    pub proposal_id: String,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub amount_paid: Option<u32>,
    pub tokens_regenerated: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCreate {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCreate {
    pub election_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_options: PaymentOption,
    pub price_options: String,
    pub resolution_strategy: ResolutionStrategy,
    pub proposals: Vec<ProposalCreate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCreate {
    pub proposal_id: String,
    pub tokens_used: u32,
}
