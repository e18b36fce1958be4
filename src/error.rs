use crate::models::Stage;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single call against the remote catalog, classified by how
/// the caller should react to it.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("rate limited (retry_after={retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("request rejected {status}: {body}")]
    Client { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Rate limits and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. } | RemoteError::Server { .. })
    }
}

/// Why a blend did not complete.
#[derive(Debug, Error)]
pub enum BlendError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{stage} stage failed: {source:#}")]
    Stage {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl BlendError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BlendError::Validation(_) => None,
            BlendError::Stage { stage, .. } => Some(*stage),
        }
    }

    pub(crate) fn at(stage: Stage) -> impl FnOnce(anyhow::Error) -> BlendError {
        move |source| BlendError::Stage { stage, source }
    }
}
