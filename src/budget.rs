use crate::models::Membership;

/// Server-authoritative token balance. Regeneration and payment charging are
/// never simulated locally.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    membership: Membership,
}

impl TokenBudget {
    pub fn from_membership(membership: Membership) -> Self {
        Self { membership }
    }

    pub fn balance(&self) -> u32 {
        self.membership.token_balance
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn refresh(&mut self, membership: Membership) {
        assert_eq!(
            membership.membership_id, self.membership.membership_id,
            "Budget refreshed with a different membership"
        );
        self.membership = membership;
    }

    pub fn clamp(&self, amount: u32) -> u32 {
        amount.min(self.membership.token_balance)
    }
}
