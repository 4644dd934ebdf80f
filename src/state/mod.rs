use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;

use crate::auth::Session;
use crate::config::{CacheConfig, ClientConfig};
use crate::error::ClientResult;
use crate::lifecycle::ElectionLifecycle;
use crate::models::{Group, Membership};
use crate::proposals::ProposalRegistry;
use crate::rest::{BackendClient, ElectionApi, GroupApi};
use crate::roster::GroupAdmin;
use crate::votes::VoteSession;

/// Shared handle for one signed-in user: the backend client plus TTL-bounded
/// caches of the read-only views. Mutations go through the per-election state
/// machines; this layer only caches reads.
#[derive(Clone)]
pub struct ClientState {
    api: Arc<BackendClient>,
    cache: Arc<ViewCache>,
}

impl ClientState {
    pub fn new(config: &ClientConfig, session: Arc<dyn Session>) -> Result<Self> {
        let api = BackendClient::new(
            &config.backend.base_url,
            config.backend.request_timeout(),
            session,
        )?;
        Ok(Self {
            api: Arc::new(api),
            cache: Arc::new(ViewCache::new(&config.cache)),
        })
    }

    pub fn api(&self) -> &Arc<BackendClient> {
        &self.api
    }

    pub async fn group_details(&self, group_id: &str) -> ClientResult<Arc<Group>> {
        if let Some(group) = self.cache.groups.get(group_id).await {
            return Ok(group);
        }
        let group = Arc::new(self.api.group_details(group_id).await?);
        self.cache
            .groups
            .insert(group_id.to_string(), Arc::clone(&group))
            .await;
        Ok(group)
    }

    pub async fn my_membership(&self, group_id: &str) -> ClientResult<Arc<Membership>> {
        if let Some(membership) = self.cache.memberships.get(group_id).await {
            return Ok(membership);
        }
        let membership = Arc::new(self.api.my_membership(group_id).await?);
        self.cache
            .memberships
            .insert(group_id.to_string(), Arc::clone(&membership))
            .await;
        Ok(membership)
    }

    /// Drop cached views after a mutation that may have changed them.
    pub async fn invalidate_group(&self, group_id: &str) {
        self.cache.groups.invalidate(group_id).await;
        self.cache.memberships.invalidate(group_id).await;
    }

    pub async fn election_lifecycle(
        &self,
        group_id: &str,
        election_id: &str,
    ) -> ClientResult<ElectionLifecycle<BackendClient>> {
        let election = self.api.election_details(group_id, election_id).await?;
        Ok(ElectionLifecycle::new(
            Arc::clone(&self.api),
            group_id,
            election,
        ))
    }

    pub async fn proposal_registry(
        &self,
        group_id: &str,
        election_id: &str,
    ) -> ClientResult<ProposalRegistry<BackendClient>> {
        let election = self.api.election_details(group_id, election_id).await?;
        Ok(ProposalRegistry::new(
            Arc::clone(&self.api),
            group_id,
            election_id,
            election.proposals,
        ))
    }

    pub async fn vote_session(
        &self,
        group_id: &str,
        election_id: &str,
    ) -> ClientResult<VoteSession<BackendClient>> {
        VoteSession::load(Arc::clone(&self.api), group_id, election_id).await
    }

    pub fn group_admin(&self, group_id: &str) -> GroupAdmin<BackendClient> {
        GroupAdmin::new(Arc::clone(&self.api), group_id)
    }
}

pub struct ViewCache {
    groups: Cache<String, Arc<Group>>,
    memberships: Cache<String, Arc<Membership>>,
}

impl ViewCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.groups_max_capacity >= 1,
            "Group cache capacity must be configured"
        );

        let groups = Cache::builder()
            .max_capacity(config.groups_max_capacity)
            .time_to_live(Duration::from_secs(config.groups_ttl_seconds))
            .build();

        let memberships = Cache::builder()
            .max_capacity(config.memberships_max_capacity)
            .time_to_live(Duration::from_secs(config.memberships_ttl_seconds))
            .build();

        Self {
            groups,
            memberships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testing::{sample_group, sample_membership};

    #[tokio::test]
    async fn view_cache_serves_and_invalidates() {
        let cache = ViewCache::new(&CacheConfig::default());
        cache
            .groups
            .insert("g1".to_string(), Arc::new(sample_group()))
            .await;
        cache
            .memberships
            .insert("g1".to_string(), Arc::new(sample_membership(10)))
            .await;

        assert!(cache.groups.get("g1").await.is_some());
        assert!(cache.memberships.get("g1").await.is_some());

        cache.groups.invalidate("g1").await;
        assert!(cache.groups.get("g1").await.is_none());
        assert!(cache.memberships.get("g1").await.is_some());
    }
}
