mod election;
mod group;

pub use election::{
    Election, ElectionCreate, ElectionStatus, PaymentOption, Proposal, ProposalCreate,
    ResolutionStrategy, Vote, VoteCreate,
};
pub use group::{
    Group, MemberWithDetails, Membership, RegenerationInterval, Role, TokenSettings, UserSummary,
};
