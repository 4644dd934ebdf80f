use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::lifecycle::{can_add_proposal, can_delete_proposal, Confirmation};
use crate::models::{ElectionStatus, Proposal, ProposalCreate};
use crate::rest::ElectionApi;
use crate::sync::{Entry, OptimisticList, RefreshToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProposal {
    pub title: String,
}

pub type ProposalEntry = Entry<Proposal, PendingProposal>;

/// The election's proposal list. Adds are optimistic and roll back on
/// failure; deletes are confirmed first and applied only after the server
/// accepts them. Server order is authoritative.
pub struct ProposalRegistry<A: ElectionApi> {
    api: Arc<A>,
    group_id: String,
    election_id: String,
    list: OptimisticList<Proposal, PendingProposal>,
}

impl<A: ElectionApi> ProposalRegistry<A> {
    pub fn new(
        api: Arc<A>,
        group_id: impl Into<String>,
        election_id: impl Into<String>,
        proposals: Vec<Proposal>,
    ) -> Self {
        Self {
            api,
            group_id: group_id.into(),
            election_id: election_id.into(),
            list: OptimisticList::from_confirmed(proposals),
        }
    }

    pub fn entries(&self) -> &[ProposalEntry] {
        self.list.entries()
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &Proposal> {
        self.list.confirmed()
    }

    pub fn contains(&self, proposal_id: &str) -> bool {
        self.confirmed().any(|p| p.proposal_id == proposal_id)
    }

    pub fn pending_count(&self) -> usize {
        self.list.pending_count()
    }

    /// The pending entry appears before the request is sent and is replaced
    /// in place on success, or removed (and nothing else) on failure.
    pub async fn add_proposal(&mut self, status: ElectionStatus, title: &str) -> ClientResult<()> {
        if !can_add_proposal(status) {
            return Err(ClientError::NotPermitted(
                "proposals may only be added to an upcoming election",
            ));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(ClientError::validation("proposal title must not be empty"));
        }

        let handle = self.list.apply(PendingProposal {
            title: title.to_string(),
        });
        let request = ProposalCreate {
            title: title.to_string(),
        };
        match self
            .api
            .add_proposal(&self.group_id, &self.election_id, &request)
            .await
        {
            Ok(proposal) => {
                info!(proposal_id = %proposal.proposal_id, "Proposal confirmed by server");
                self.list.commit(handle, proposal);
                Ok(())
            }
            Err(err) => {
                warn!("Proposal creation failed, rolling back pending entry: {err}");
                self.list.rollback(handle);
                Err(err)
            }
        }
    }

    /// Nothing changes locally until the server accepts the removal.
    pub async fn delete_proposal(
        &mut self,
        status: ElectionStatus,
        is_admin: bool,
        confirmation: &dyn Confirmation,
        proposal_id: &str,
    ) -> ClientResult<()> {
        if !can_delete_proposal(status, is_admin) {
            return Err(ClientError::NotPermitted(
                "only admins may delete proposals from an upcoming election",
            ));
        }
        if !confirmation.confirm("Are you sure you want to delete this proposal?") {
            return Err(ClientError::Cancelled);
        }

        self.api
            .delete_proposal(&self.group_id, &self.election_id, proposal_id)
            .await?;
        self.list
            .retain_confirmed(|p| p.proposal_id != proposal_id);

        // Best effort realignment with server order; the delete itself has
        // already been applied.
        let token = self.list.begin_refresh();
        match self
            .api
            .election_details(&self.group_id, &self.election_id)
            .await
        {
            Ok(details) => {
                self.list.apply_refresh(token, details.proposals);
            }
            Err(err) => warn!("Post-delete refresh failed: {err}"),
        }
        Ok(())
    }

    pub fn begin_refresh(&self) -> RefreshToken {
        self.list.begin_refresh()
    }

    /// Returns false when the snapshot was stale and ignored.
    pub fn apply_refresh(&mut self, token: RefreshToken, proposals: Vec<Proposal>) -> bool {
        self.list.apply_refresh(token, proposals)
    }

    pub async fn refresh(&mut self) -> ClientResult<bool> {
        let token = self.begin_refresh();
        let details = self
            .api
            .election_details(&self.group_id, &self.election_id)
            .await?;
        Ok(self.apply_refresh(token, details.proposals))
    }
}
