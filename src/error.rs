use thiserror::Error;

/// Failures of a single explorer lookup. Every variant is recoverable: the
/// retriever falls back to sample data.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("no explorer endpoint configured for network '{0}'")]
    NoEndpoint(String),

    #[error("explorer request timed out")]
    Timeout,

    #[error("explorer returned HTTP {0}")]
    Status(u16),

    #[error("explorer request failed: {0}")]
    Transport(String),

    #[error("explorer API error: {0}")]
    Api(String),

    #[error("failed to parse ABI JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ExplorerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ExplorerError::Timeout
        } else if let Some(status) = e.status() {
            ExplorerError::Status(status.as_u16())
        } else {
            ExplorerError::Transport(e.to_string())
        }
    }
}

impl ExplorerError {
    /// A missing endpoint is configuration, not a failure worth a warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, ExplorerError::NoEndpoint(_))
    }
}
