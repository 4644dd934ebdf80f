//! Client engine for token-weighted group elections.
//!
//! Members of a group vote on election proposals by committing tokens from a
//! spendable balance. This crate owns the client side of that flow: the
//! election lifecycle gates, the per-member vote session, the optimistic
//! proposal list, and a typed REST client for the backend that owns all real
//! business rules (persistence, tallying, token regeneration).

pub mod auth;
pub mod budget;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod proposals;
pub mod rest;
pub mod roster;
pub mod state;
pub mod sync;
pub mod votes;

pub use auth::{Session, StaticSession};
pub use budget::TokenBudget;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use lifecycle::{
    can_add_proposal, can_delete_proposal, can_vote, Confirmation, ElectionLifecycle,
};
pub use proposals::{PendingProposal, ProposalEntry, ProposalRegistry};
pub use rest::{BackendClient, ElectionApi, GroupApi};
pub use roster::{GroupAdmin, GroupRoster};
pub use state::ClientState;
pub use votes::{VoteLabel, VoteSession};
