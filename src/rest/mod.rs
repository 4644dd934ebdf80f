use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::auth::Session;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    Election, ElectionCreate, Group, MemberWithDetails, Membership, Proposal, ProposalCreate,
    TokenSettings, Vote, VoteCreate,
};

/// Election-scoped backend operations. The state machines depend on this
/// seam, not on the HTTP client, so tests can inject an in-memory backend.
#[async_trait]
pub trait ElectionApi: Send + Sync {
    async fn election_details(&self, group_id: &str, election_id: &str) -> ClientResult<Election>;

    async fn create_election(
        &self,
        group_id: &str,
        request: &ElectionCreate,
    ) -> ClientResult<Election>;

    async fn start_election_now(
        &self,
        group_id: &str,
        election_id: &str,
    ) -> ClientResult<Election>;

    async fn close_election(
        &self,
        group_id: &str,
        election_id: &str,
        winning_proposal_id: Option<&str>,
    ) -> ClientResult<Election>;

    async fn add_proposal(
        &self,
        group_id: &str,
        election_id: &str,
        request: &ProposalCreate,
    ) -> ClientResult<Proposal>;

    async fn delete_proposal(
        &self,
        group_id: &str,
        election_id: &str,
        proposal_id: &str,
    ) -> ClientResult<()>;

    async fn cast_vote(
        &self,
        group_id: &str,
        election_id: &str,
        request: &VoteCreate,
    ) -> ClientResult<Vote>;

    async fn my_vote(&self, group_id: &str, election_id: &str) -> ClientResult<Option<Vote>>;

    async fn my_membership(&self, group_id: &str) -> ClientResult<Membership>;
}

/// Group- and membership-scoped backend operations.
#[async_trait]
pub trait GroupApi: Send + Sync {
    async fn group_details(&self, group_id: &str) -> ClientResult<Group>;

    async fn group_members(&self, group_id: &str) -> ClientResult<Vec<MemberWithDetails>>;

    async fn group_elections(&self, group_id: &str) -> ClientResult<Vec<Election>>;

    async fn invite_member(&self, group_id: &str, email: &str) -> ClientResult<Membership>;

    async fn remove_member(&self, group_id: &str, email: &str) -> ClientResult<()>;

    async fn set_token_balance(
        &self,
        group_id: &str,
        user_id: &str,
        token_balance: u32,
    ) -> ClientResult<Membership>;

    async fn update_token_settings(
        &self,
        group_id: &str,
        settings: &TokenSettings,
    ) -> ClientResult<Group>;
}

/// Typed REST client for the group-voting backend. Attaches the session's
/// bearer token to every request.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn Session>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<dyn Session>) -> Result<Self> {
        assert!(!base_url.is_empty(), "Backend base URL must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| format!("Failed to build HTTP client for {base_url}"))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> ClientResult<T> {
        let response = self.dispatch(method, path, body).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(backend_error(status, response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn request_no_content(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> ClientResult<()> {
        let response = self.dispatch(method, path, body).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(backend_error(status, response).await);
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> ClientResult<reqwest::Response> {
        assert!(path.starts_with('/'), "Request path must be absolute");

        let token = self.session.auth_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// Extract the backend's human-readable detail, falling back to a generic
/// message. FastAPI-style backends put it under "detail", either as a string
/// or a list of field errors.
async fn backend_error(status: StatusCode, response: reqwest::Response) -> ClientError {
    let detail = match response.json::<Value>().await {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "request failed".to_string(),
        },
        _ => "request failed".to_string(),
    };
    info!("Backend error {}: {detail}", status.as_u16());
    ClientError::Backend {
        status: status.as_u16(),
        detail,
    }
}

#[async_trait]
impl ElectionApi for BackendClient {
    async fn election_details(&self, group_id: &str, election_id: &str) -> ClientResult<Election> {
        self.request(
            Method::GET,
            &format!("/groups/{group_id}/elections/{election_id}"),
            None::<&()>,
        )
        .await
    }

    async fn create_election(
        &self,
        group_id: &str,
        request: &ElectionCreate,
    ) -> ClientResult<Election> {
        self.request(
            Method::POST,
            &format!("/groups/{group_id}/elections"),
            Some(request),
        )
        .await
    }

    async fn start_election_now(
        &self,
        group_id: &str,
        election_id: &str,
    ) -> ClientResult<Election> {
        self.request(
            Method::POST,
            &format!("/groups/{group_id}/elections/{election_id}/start-now"),
            None::<&()>,
        )
        .await
    }

    async fn close_election(
        &self,
        group_id: &str,
        election_id: &str,
        winning_proposal_id: Option<&str>,
    ) -> ClientResult<Election> {
        let body = match winning_proposal_id {
            Some(id) => serde_json::json!({ "winning_proposal_id": id }),
            None => serde_json::json!({}),
        };
        self.request(
            Method::PUT,
            &format!("/groups/{group_id}/elections/{election_id}/close"),
            Some(&body),
        )
        .await
    }

    async fn add_proposal(
        &self,
        group_id: &str,
        election_id: &str,
        request: &ProposalCreate,
    ) -> ClientResult<Proposal> {
        self.request(
            Method::POST,
            &format!("/groups/{group_id}/elections/{election_id}/proposals"),
            Some(request),
        )
        .await
    }

    async fn delete_proposal(
        &self,
        group_id: &str,
        election_id: &str,
        proposal_id: &str,
    ) -> ClientResult<()> {
        self.request_no_content(
            Method::DELETE,
            &format!("/groups/{group_id}/elections/{election_id}/proposals/{proposal_id}"),
            None::<&()>,
        )
        .await
    }

    async fn cast_vote(
        &self,
        group_id: &str,
        election_id: &str,
        request: &VoteCreate,
    ) -> ClientResult<Vote> {
        self.request(
            Method::POST,
            &format!("/groups/{group_id}/elections/{election_id}/votes"),
            Some(request),
        )
        .await
    }

    async fn my_vote(&self, group_id: &str, election_id: &str) -> ClientResult<Option<Vote>> {
        let result: ClientResult<Vote> = self
            .request(
                Method::GET,
                &format!("/groups/{group_id}/elections/{election_id}/votes/me"),
                None::<&()>,
            )
            .await;
        match result {
            Ok(vote) => Ok(Some(vote)),
            Err(ClientError::Backend { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn my_membership(&self, group_id: &str) -> ClientResult<Membership> {
        self.request(
            Method::GET,
            &format!("/memberships/groups/{group_id}/me"),
            None::<&()>,
        )
        .await
    }
}

#[async_trait]
impl GroupApi for BackendClient {
    async fn group_details(&self, group_id: &str) -> ClientResult<Group> {
        self.request(Method::GET, &format!("/groups/{group_id}"), None::<&()>)
            .await
    }

    async fn group_members(&self, group_id: &str) -> ClientResult<Vec<MemberWithDetails>> {
        self.request(
            Method::GET,
            &format!("/groups/{group_id}/members"),
            None::<&()>,
        )
        .await
    }

    async fn group_elections(&self, group_id: &str) -> ClientResult<Vec<Election>> {
        self.request(
            Method::GET,
            &format!("/groups/{group_id}/elections"),
            None::<&()>,
        )
        .await
    }

    async fn invite_member(&self, group_id: &str, email: &str) -> ClientResult<Membership> {
        let body = serde_json::json!({ "email_to_add": email });
        self.request(
            Method::POST,
            &format!("/memberships/groups/{group_id}/members"),
            Some(&body),
        )
        .await
    }

    async fn remove_member(&self, group_id: &str, email: &str) -> ClientResult<()> {
        let body = serde_json::json!({ "email_to_remove": email });
        self.request_no_content(
            Method::DELETE,
            &format!("/memberships/groups/{group_id}/members"),
            Some(&body),
        )
        .await
    }

    async fn set_token_balance(
        &self,
        group_id: &str,
        user_id: &str,
        token_balance: u32,
    ) -> ClientResult<Membership> {
        let body = serde_json::json!({ "token_balance": token_balance });
        self.request(
            Method::PATCH,
            &format!("/groups/{group_id}/members/{user_id}/token-balance"),
            Some(&body),
        )
        .await
    }

    async fn update_token_settings(
        &self,
        group_id: &str,
        settings: &TokenSettings,
    ) -> ClientResult<Group> {
        self.request(
            Method::PUT,
            &format!("/groups/{group_id}/token-settings"),
            Some(settings),
        )
        .await
    }
}
