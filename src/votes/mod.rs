use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::budget::TokenBudget;
use crate::error::{ClientError, ClientResult};
use crate::lifecycle::can_vote;
use crate::models::{ElectionStatus, Membership, Vote, VoteCreate};
use crate::rest::ElectionApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteLabel {
    ConfirmVote,
    ChangeVote,
}

impl VoteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteLabel::ConfirmVote => "Confirm Vote",
            VoteLabel::ChangeVote => "Change your vote",
        }
    }
}

/// Per-member voting state for one election. Casting is not optimistic: the
/// stored vote and the token budget only ever change to server-returned
/// values.
pub struct VoteSession<A: ElectionApi> {
    api: Arc<A>,
    group_id: String,
    election_id: String,
    budget: TokenBudget,
    current_vote: Option<Vote>,
    selected: Option<String>,
    amount: u32,
    cast_in_flight: AtomicBool,
}

// Clears the in-flight flag even when the cast future is dropped mid-await.
struct CastGuard<'a>(&'a AtomicBool);

impl<'a> CastGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::Acquire)).then(|| CastGuard(flag))
    }
}

impl Drop for CastGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: ElectionApi> VoteSession<A> {
    pub fn new(
        api: Arc<A>,
        group_id: impl Into<String>,
        election_id: impl Into<String>,
        membership: Membership,
        current_vote: Option<Vote>,
    ) -> Self {
        let group_id = group_id.into();
        let election_id = election_id.into();
        assert_eq!(
            membership.group_id, group_id,
            "Membership belongs to a different group"
        );
        if let Some(vote) = &current_vote {
            assert_eq!(
                vote.election_id, election_id,
                "Vote belongs to a different election"
            );
        }
        Self {
            api,
            group_id,
            election_id,
            budget: TokenBudget::from_membership(membership),
            current_vote,
            selected: None,
            amount: 0,
            cast_in_flight: AtomicBool::new(false),
        }
    }

    pub async fn load(
        api: Arc<A>,
        group_id: impl Into<String>,
        election_id: impl Into<String>,
    ) -> ClientResult<Self> {
        let group_id = group_id.into();
        let election_id = election_id.into();
        let membership = api.my_membership(&group_id).await?;
        let current_vote = api.my_vote(&group_id, &election_id).await?;
        Ok(Self::new(api, group_id, election_id, membership, current_vote))
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn current_vote(&self) -> Option<&Vote> {
        self.current_vote.as_ref()
    }

    pub fn selected_proposal(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// The amount pre-fills only when the stored vote targets this proposal;
    /// amounts typed for other proposals never carry over.
    pub fn select_proposal(&mut self, proposal_id: &str) {
        self.selected = Some(proposal_id.to_string());
        self.amount = match &self.current_vote {
            Some(vote) if vote.proposal_id == proposal_id => self.budget.clamp(vote.tokens_used),
            _ => 0,
        };
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.amount = 0;
    }

    /// Clamped to `[0, balance]` at all times.
    pub fn set_amount(&mut self, amount: u32) {
        self.amount = self.budget.clamp(amount);
    }

    pub fn confirm_enabled(&self, status: ElectionStatus) -> bool {
        can_vote(status)
            && self.selected.is_some()
            && self.amount > 0
            && !self.cast_in_flight.load(Ordering::Acquire)
    }

    pub fn vote_label(&self) -> VoteLabel {
        match (&self.selected, &self.current_vote) {
            (Some(selected), Some(vote)) if *selected == vote.proposal_id => VoteLabel::ChangeVote,
            _ => VoteLabel::ConfirmVote,
        }
    }

    /// Cast or replace this member's vote. Nothing changes on failure.
    pub async fn cast_vote(&mut self, status: ElectionStatus) -> ClientResult<&Vote> {
        if !can_vote(status) {
            return Err(ClientError::NotPermitted(
                "votes may only be cast while the election is open",
            ));
        }
        let Some(guard) = CastGuard::acquire(&self.cast_in_flight) else {
            return Err(ClientError::NotPermitted(
                "a vote submission is already in flight",
            ));
        };
        let Some(proposal_id) = self.selected.clone() else {
            return Err(ClientError::validation("select a proposal before voting"));
        };
        if self.amount == 0 {
            return Err(ClientError::validation("no tokens committed"));
        }
        assert!(
            self.amount <= self.budget.balance(),
            "Vote amount exceeds token balance"
        );

        let request = VoteCreate {
            proposal_id,
            tokens_used: self.amount,
        };
        let result = self
            .api
            .cast_vote(&self.group_id, &self.election_id, &request)
            .await;
        drop(guard);
        let vote = result?;
        info!(
            proposal_id = %vote.proposal_id,
            tokens_used = vote.tokens_used,
            "Vote accepted by server"
        );

        // The balance may have moved under regeneration rules the backend
        // owns; revalidate rather than doing local arithmetic.
        match self.api.my_membership(&self.group_id).await {
            Ok(membership) => self.budget.refresh(membership),
            Err(err) => warn!("Budget revalidation after vote failed: {err}"),
        }

        self.amount = self.budget.clamp(vote.tokens_used);
        Ok(self.current_vote.insert(vote))
    }

    /// Drop the selection when its proposal no longer exists.
    pub fn reconcile_proposals<'a, I>(&mut self, existing_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(selected) = self.selected.as_deref() else {
            return;
        };
        if !existing_ids.into_iter().any(|id| id == selected) {
            self.clear_selection();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testing::{sample_election, sample_membership, FakeBackend};

    fn open_session(balance: u32) -> (Arc<FakeBackend>, VoteSession<FakeBackend>) {
        let api = Arc::new(FakeBackend::new(
            sample_election(ElectionStatus::Open),
            sample_membership(balance),
        ));
        let session = VoteSession::new(
            Arc::clone(&api),
            "g1",
            "e1",
            sample_membership(balance),
            None,
        );
        (api, session)
    }

    #[test]
    fn amount_is_always_clamped_to_balance() {
        let (_api, mut session) = open_session(10);
        session.select_proposal("p1");
        session.set_amount(15);
        assert_eq!(session.amount(), 10);
        session.set_amount(3);
        assert_eq!(session.amount(), 3);
    }

    #[test]
    fn zero_amount_disables_confirm() {
        let (_api, mut session) = open_session(10);
        session.select_proposal("p1");
        assert!(!session.confirm_enabled(ElectionStatus::Open));
        session.set_amount(1);
        assert!(session.confirm_enabled(ElectionStatus::Open));
        assert!(!session.confirm_enabled(ElectionStatus::Upcoming));
        assert!(!session.confirm_enabled(ElectionStatus::Closed));
    }

    #[tokio::test]
    async fn zero_amount_cast_sends_no_request() {
        let (api, mut session) = open_session(10);
        session.select_proposal("p1");
        let err = session.cast_vote(ElectionStatus::Open).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn cast_is_gated_on_open_status() {
        let (api, mut session) = open_session(10);
        session.select_proposal("p1");
        session.set_amount(5);
        let err = session.cast_vote(ElectionStatus::Closed).await.unwrap_err();
        assert!(matches!(err, ClientError::NotPermitted(_)));
        assert!(api.requests().is_empty());
    }

    #[test]
    fn switching_selection_never_carries_the_amount_over() {
        let (_api, mut session) = open_session(10);
        session.select_proposal("A");
        session.set_amount(7);
        session.select_proposal("B");
        assert_eq!(session.amount(), 0);
        session.select_proposal("A");
        assert_eq!(session.amount(), 0);
    }

    #[tokio::test]
    async fn reselecting_the_voted_proposal_prefills_and_relabels() {
        let (_api, mut session) = open_session(10);
        session.select_proposal("p1");
        session.set_amount(6);
        session.cast_vote(ElectionStatus::Open).await.unwrap();

        session.select_proposal("p2");
        assert_eq!(session.amount(), 0);
        assert_eq!(session.vote_label(), VoteLabel::ConfirmVote);

        session.select_proposal("p1");
        assert_eq!(session.amount(), 6);
        assert_eq!(session.vote_label(), VoteLabel::ChangeVote);
        assert_eq!(session.vote_label().as_str(), "Change your vote");
    }

    #[tokio::test]
    async fn recast_replaces_the_single_vote_record() {
        let (api, mut session) = open_session(10);
        session.select_proposal("A");
        session.set_amount(10);
        let first_id = session
            .cast_vote(ElectionStatus::Open)
            .await
            .unwrap()
            .vote_id
            .clone();

        session.select_proposal("B");
        session.set_amount(4);
        let replaced = session.cast_vote(ElectionStatus::Open).await.unwrap();
        assert_eq!(replaced.vote_id, first_id);
        assert_eq!(replaced.proposal_id, "B");
        assert_eq!(replaced.tokens_used, 4);

        let state = api.state.lock().unwrap();
        let stored = state.my_vote.as_ref().unwrap();
        assert_eq!(stored.proposal_id, "B");
        assert_eq!(stored.tokens_used, 4);
    }

    #[tokio::test]
    async fn recasting_identically_is_idempotent() {
        let (api, mut session) = open_session(10);
        session.select_proposal("A");
        session.set_amount(5);
        session.cast_vote(ElectionStatus::Open).await.unwrap();
        session.select_proposal("A");
        session.cast_vote(ElectionStatus::Open).await.unwrap();

        let state = api.state.lock().unwrap();
        let stored = state.my_vote.as_ref().unwrap();
        assert_eq!(stored.proposal_id, "A");
        assert_eq!(stored.tokens_used, 5);
        assert_eq!(stored.vote_id, "v-m1");
    }

    #[tokio::test]
    async fn failed_cast_leaves_vote_and_amount_untouched() {
        let (api, mut session) = open_session(10);
        session.select_proposal("A");
        session.set_amount(8);
        api.fail_next("cast_vote");

        let err = session.cast_vote(ElectionStatus::Open).await.unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
        assert!(session.current_vote().is_none());
        assert_eq!(session.amount(), 8);
        assert_eq!(session.selected_proposal(), Some("A"));
        assert!(session.confirm_enabled(ElectionStatus::Open));
    }

    #[tokio::test]
    async fn successful_cast_revalidates_the_budget() {
        let (api, mut session) = open_session(10);
        session.select_proposal("A");
        session.set_amount(10);
        // The backend charges the member as part of accepting the vote.
        api.state.lock().unwrap().post_cast_balance = Some(2);

        session.cast_vote(ElectionStatus::Open).await.unwrap();
        assert_eq!(session.budget().balance(), 2);
        assert_eq!(session.amount(), 2);
    }

    #[test]
    fn removed_selection_is_invalidated() {
        let (_api, mut session) = open_session(10);
        session.select_proposal("p2");
        session.set_amount(4);

        session.reconcile_proposals(["p1", "p2"]);
        assert_eq!(session.selected_proposal(), Some("p2"));
        assert_eq!(session.amount(), 4);

        session.reconcile_proposals(["p1"]);
        assert_eq!(session.selected_proposal(), None);
        assert_eq!(session.amount(), 0);
    }

    // Hangs the first cast so the caller can abandon it; later casts pass
    // through to the in-memory backend.
    struct StallOnceApi {
        inner: FakeBackend,
        stalled: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ElectionApi for StallOnceApi {
        async fn election_details(
            &self,
            group_id: &str,
            election_id: &str,
        ) -> ClientResult<crate::models::Election> {
            self.inner.election_details(group_id, election_id).await
        }

        async fn create_election(
            &self,
            group_id: &str,
            request: &crate::models::ElectionCreate,
        ) -> ClientResult<crate::models::Election> {
            self.inner.create_election(group_id, request).await
        }

        async fn start_election_now(
            &self,
            group_id: &str,
            election_id: &str,
        ) -> ClientResult<crate::models::Election> {
            self.inner.start_election_now(group_id, election_id).await
        }

        async fn close_election(
            &self,
            group_id: &str,
            election_id: &str,
            winning_proposal_id: Option<&str>,
        ) -> ClientResult<crate::models::Election> {
            self.inner
                .close_election(group_id, election_id, winning_proposal_id)
                .await
        }

        async fn add_proposal(
            &self,
            group_id: &str,
            election_id: &str,
            request: &crate::models::ProposalCreate,
        ) -> ClientResult<crate::models::Proposal> {
            self.inner.add_proposal(group_id, election_id, request).await
        }

        async fn delete_proposal(
            &self,
            group_id: &str,
            election_id: &str,
            proposal_id: &str,
        ) -> ClientResult<()> {
            self.inner
                .delete_proposal(group_id, election_id, proposal_id)
                .await
        }

        async fn cast_vote(
            &self,
            group_id: &str,
            election_id: &str,
            request: &VoteCreate,
        ) -> ClientResult<Vote> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.cast_vote(group_id, election_id, request).await
        }

        async fn my_vote(&self, group_id: &str, election_id: &str) -> ClientResult<Option<Vote>> {
            self.inner.my_vote(group_id, election_id).await
        }

        async fn my_membership(&self, group_id: &str) -> ClientResult<Membership> {
            self.inner.my_membership(group_id).await
        }
    }

    #[tokio::test]
    async fn abandoned_cast_releases_the_in_flight_guard() {
        let api = Arc::new(StallOnceApi {
            inner: FakeBackend::new(sample_election(ElectionStatus::Open), sample_membership(10)),
            stalled: AtomicBool::new(false),
        });
        let mut session =
            VoteSession::new(Arc::clone(&api), "g1", "e1", sample_membership(10), None);
        session.select_proposal("p1");
        session.set_amount(5);

        // The caller gives up on the hung submission and drops its future.
        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            session.cast_vote(ElectionStatus::Open),
        )
        .await;
        assert!(abandoned.is_err());

        assert!(session.confirm_enabled(ElectionStatus::Open));
        let vote = session.cast_vote(ElectionStatus::Open).await.unwrap();
        assert_eq!(vote.proposal_id, "p1");
        assert_eq!(vote.tokens_used, 5);
    }

    #[tokio::test]
    async fn cast_is_rejected_while_one_is_in_flight() {
        let (api, mut session) = open_session(10);
        session.select_proposal("p1");
        session.set_amount(5);
        session.cast_in_flight.store(true, Ordering::SeqCst);

        assert!(!session.confirm_enabled(ElectionStatus::Open));
        let err = session.cast_vote(ElectionStatus::Open).await.unwrap_err();
        assert!(matches!(err, ClientError::NotPermitted(_)));
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn load_picks_up_membership_and_existing_vote() {
        let api = Arc::new(FakeBackend::new(
            sample_election(ElectionStatus::Open),
            sample_membership(7),
        ));
        {
            let mut seed =
                VoteSession::new(Arc::clone(&api), "g1", "e1", sample_membership(7), None);
            seed.select_proposal("p1");
            seed.set_amount(3);
            seed.cast_vote(ElectionStatus::Open).await.unwrap();
        }

        let session = VoteSession::load(Arc::clone(&api), "g1", "e1").await.unwrap();
        assert_eq!(session.budget().balance(), 7);
        assert_eq!(session.current_vote().unwrap().proposal_id, "p1");
    }
}
