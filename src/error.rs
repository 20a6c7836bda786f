// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

use crate::domain::UpstreamReply;

/// Input yang ditolak sebelum sign / network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("malformed request body: {0}")]
    Body(String),
}

impl ValidationError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::Missing(f) => Some(f),
            ValidationError::Invalid { field, .. } => Some(field),
            ValidationError::Body(_) => None,
        }
    }
}

/// Gagal menjangkau exchange atau membaca responsnya.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request to exchange failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("exchange returned malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected balance payload: {0}")]
    Balance(String),
    #[error("invalid exchange url: {0}")]
    Url(#[from] url::ParseError),
}

impl ProxyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Transport(_) => "transport",
            ProxyError::Malformed(_) => "malformed",
            ProxyError::Balance(_) => "balance",
            ProxyError::Url(_) => "url",
        }
    }
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    /// Non-2xx dari exchange; diteruskan apa adanya.
    #[error("exchange rejected request with status {}", .0.status)]
    Rejected(UpstreamReply),
}
