use async_trait::async_trait;

use crate::error::ClientResult;

/// Identity-provider seam: the signed-in user's id plus an opaque bearer
/// token attached to every backend request.
#[async_trait]
pub trait Session: Send + Sync {
    fn user_id(&self) -> &str;

    /// Providers that rotate tokens may suspend here; the returned value is
    /// never cached.
    async fn auth_token(&self) -> ClientResult<String>;
}

/// Fixed-token session for tests and short-lived tools.
pub struct StaticSession {
    user_id: String,
    token: String,
}

impl StaticSession {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let token = token.into();
        assert!(!user_id.is_empty(), "Session user id must be provided");
        assert!(!token.is_empty(), "Session token must be provided");
        Self { user_id, token }
    }
}

#[async_trait]
impl Session for StaticSession {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn auth_token(&self) -> ClientResult<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_session_returns_fixed_credentials() {
        let session = StaticSession::new("user-1", "bearer-abc");
        assert_eq!(session.user_id(), "user-1");
        assert_eq!(session.auth_token().await.unwrap(), "bearer-abc");
    }

    #[test]
    #[should_panic(expected = "Session user id must be provided")]
    fn empty_user_id_is_rejected() {
        StaticSession::new("", "bearer-abc");
    }
}
