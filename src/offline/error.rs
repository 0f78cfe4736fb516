use super::agent::Phase;
use super::network::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("install failed while caching {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("cannot {signal} while {phase}")]
    InvalidTransition { phase: Phase, signal: &'static str },

    #[error("invalid manifest URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
