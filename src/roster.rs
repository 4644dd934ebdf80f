use std::sync::Arc;

use tracing::info;

use crate::error::{ClientError, ClientResult};
use crate::lifecycle::Confirmation;
use crate::models::{
    Election, ElectionCreate, Group, MemberWithDetails, Membership, TokenSettings,
};
use crate::rest::{ElectionApi, GroupApi};

/// Read-only cache of a group's member list, used to answer role questions.
#[derive(Debug, Clone, Default)]
pub struct GroupRoster {
    members: Vec<MemberWithDetails>,
}

impl GroupRoster {
    pub fn new(members: Vec<MemberWithDetails>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[MemberWithDetails] {
        &self.members
    }

    pub fn membership_of(&self, user_id: &str) -> Option<&Membership> {
        self.members
            .iter()
            .find(|m| m.membership.user_id == user_id)
            .map(|m| &m.membership)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.membership_of(user_id)
            .is_some_and(|m| m.role == crate::models::Role::Admin)
    }

    pub fn replace_all(&mut self, members: Vec<MemberWithDetails>) {
        self.members = members;
    }
}

/// Admin-facing group operations. None of these are optimistic; local copies
/// are only replaced with what the server returns.
pub struct GroupAdmin<A> {
    api: Arc<A>,
    group_id: String,
}

impl<A: GroupApi + ElectionApi> GroupAdmin<A> {
    pub fn new(api: Arc<A>, group_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        assert!(!group_id.is_empty(), "Group id must be provided");
        Self { api, group_id }
    }

    pub async fn load_roster(&self) -> ClientResult<GroupRoster> {
        let members = self.api.group_members(&self.group_id).await?;
        Ok(GroupRoster::new(members))
    }

    pub async fn invite_member(&self, is_admin: bool, email: &str) -> ClientResult<Membership> {
        if !is_admin {
            return Err(ClientError::NotPermitted("only admins may invite members"));
        }
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ClientError::validation("a valid email address is required"));
        }
        let membership = self.api.invite_member(&self.group_id, email).await?;
        info!(group_id = %self.group_id, "Member invited");
        Ok(membership)
    }

    pub async fn remove_member(
        &self,
        is_admin: bool,
        confirmation: &dyn Confirmation,
        email: &str,
    ) -> ClientResult<()> {
        if !is_admin {
            return Err(ClientError::NotPermitted("only admins may remove members"));
        }
        if !confirmation.confirm("Are you sure you want to remove this member from the group?") {
            return Err(ClientError::Cancelled);
        }
        self.api.remove_member(&self.group_id, email).await?;
        info!(group_id = %self.group_id, "Member removed");
        Ok(())
    }

    /// Callers must replace any cached budget with the returned membership.
    pub async fn set_token_balance(
        &self,
        is_admin: bool,
        user_id: &str,
        token_balance: u32,
    ) -> ClientResult<Membership> {
        if !is_admin {
            return Err(ClientError::NotPermitted(
                "only admins may edit token balances",
            ));
        }
        self.api
            .set_token_balance(&self.group_id, user_id, token_balance)
            .await
    }

    pub async fn update_token_settings(
        &self,
        is_admin: bool,
        settings: &TokenSettings,
    ) -> ClientResult<Group> {
        if !is_admin {
            return Err(ClientError::NotPermitted(
                "only admins may edit token settings",
            ));
        }
        if settings.initial_tokens > settings.max_tokens {
            return Err(ClientError::validation(
                "initial tokens cannot exceed the maximum",
            ));
        }
        if settings.regeneration_rate > settings.max_tokens {
            return Err(ClientError::validation(
                "regeneration rate cannot exceed the maximum",
            ));
        }
        self.api
            .update_token_settings(&self.group_id, settings)
            .await
    }

    pub async fn create_election(
        &self,
        is_admin: bool,
        request: &ElectionCreate,
    ) -> ClientResult<Election> {
        if !is_admin {
            return Err(ClientError::NotPermitted(
                "only admins may create elections",
            ));
        }
        validate_election_create(request)?;
        let election = self.api.create_election(&self.group_id, request).await?;
        info!(election_id = %election.election_id, "Election created");
        Ok(election)
    }
}

fn validate_election_create(request: &ElectionCreate) -> ClientResult<()> {
    if request.election_name.trim().is_empty() {
        return Err(ClientError::validation("election name must not be empty"));
    }
    if request.start_date >= request.end_date {
        return Err(ClientError::validation(
            "election must end after it starts",
        ));
    }
    if request.proposals.is_empty() {
        return Err(ClientError::validation(
            "an election needs at least one proposal",
        ));
    }
    if request
        .proposals
        .iter()
        .any(|p| p.title.trim().is_empty())
    {
        return Err(ClientError::validation(
            "proposal titles must not be empty",
        ));
    }
    Ok(())
}
