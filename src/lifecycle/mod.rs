use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{ClientError, ClientResult};
use crate::models::{Election, ElectionStatus};
use crate::rest::ElectionApi;

pub fn can_add_proposal(status: ElectionStatus) -> bool {
    status == ElectionStatus::Upcoming
}

pub fn can_delete_proposal(status: ElectionStatus, is_admin: bool) -> bool {
    is_admin && status == ElectionStatus::Upcoming
}

pub fn can_vote(status: ElectionStatus) -> bool {
    status == ElectionStatus::Open
}

/// Status the voting window implies at `now`. Display guidance only; the
/// server-reported status stays authoritative for gating.
pub fn status_at(election: &Election, now: DateTime<Utc>) -> ElectionStatus {
    if now < election.start_date {
        ElectionStatus::Upcoming
    } else if now < election.end_date {
        ElectionStatus::Open
    } else {
        ElectionStatus::Closed
    }
}

/// User-facing confirmation prompt for irreversible actions.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Latest server copy of one election plus the admin transitions. On success
/// the local election is replaced wholesale; on failure it is left untouched.
pub struct ElectionLifecycle<A: ElectionApi> {
    api: Arc<A>,
    group_id: String,
    election: Election,
}

impl<A: ElectionApi> ElectionLifecycle<A> {
    pub fn new(api: Arc<A>, group_id: impl Into<String>, election: Election) -> Self {
        let group_id = group_id.into();
        assert!(!group_id.is_empty(), "Group id must be provided");
        assert_eq!(
            election.group_id, group_id,
            "Election belongs to a different group"
        );
        Self {
            api,
            group_id,
            election,
        }
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn status(&self) -> ElectionStatus {
        self.election.status
    }

    pub async fn refresh(&mut self) -> ClientResult<&Election> {
        let election = self
            .api
            .election_details(&self.group_id, &self.election.election_id)
            .await?;
        self.election = election;
        Ok(&self.election)
    }

    pub async fn start_now(&mut self, is_admin: bool) -> ClientResult<&Election> {
        if !is_admin {
            return Err(ClientError::NotPermitted(
                "only admins may start an election",
            ));
        }
        if self.election.status != ElectionStatus::Upcoming {
            return Err(ClientError::NotPermitted(
                "only an upcoming election can be started",
            ));
        }

        let started = self
            .api
            .start_election_now(&self.group_id, &self.election.election_id)
            .await?;
        info!(
            election_id = %started.election_id,
            "Election started early by admin"
        );
        self.election = started;
        Ok(&self.election)
    }

    /// Irreversible, so the injected prompt must be accepted before any
    /// request is sent.
    pub async fn close_early(
        &mut self,
        is_admin: bool,
        confirmation: &dyn Confirmation,
    ) -> ClientResult<&Election> {
        if !is_admin {
            return Err(ClientError::NotPermitted(
                "only admins may close an election",
            ));
        }
        if self.election.status != ElectionStatus::Open {
            return Err(ClientError::NotPermitted(
                "only an open election can be closed early",
            ));
        }
        if !confirmation.confirm(
            "Are you sure you want to close this election early? This action is irreversible.",
        ) {
            return Err(ClientError::Cancelled);
        }

        let closed = self
            .api
            .close_election(&self.group_id, &self.election.election_id, None)
            .await?;
        info!(
            election_id = %closed.election_id,
            winner = ?closed.winning_proposal_id,
            "Election closed early by admin"
        );
        self.election = closed;
        Ok(&self.election)
    }
}
