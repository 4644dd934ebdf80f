use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("backend rejected the request ({status}): {detail}")]
    Backend { status: u16, detail: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("operation not permitted: {0}")]
    NotPermitted(&'static str),

    #[error("cancelled by user")]
    Cancelled,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        assert!(!message.is_empty(), "Validation message cannot be empty");
        ClientError::Validation(message)
    }

    /// True when no request reached the backend for this failure.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::NotPermitted(_) | ClientError::Cancelled
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_are_flagged() {
        assert!(ClientError::validation("empty title").is_local());
        assert!(ClientError::NotPermitted("not an admin").is_local());
        assert!(ClientError::Cancelled.is_local());
        assert!(!ClientError::Network("timed out".to_string()).is_local());
        assert!(!ClientError::Backend {
            status: 422,
            detail: "tokens_used exceeds balance".to_string()
        }
        .is_local());
    }

    #[test]
    fn backend_error_display_includes_status_and_detail() {
        let err = ClientError::Backend {
            status: 403,
            detail: "only admins may close elections".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("403"));
        assert!(rendered.contains("only admins may close elections"));
    }
}
