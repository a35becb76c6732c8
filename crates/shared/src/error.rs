use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Network,
    Unauthorized,
    NotFound,
    RateLimited,
    Upstream,
    Malformed,
}

/// Failure of a catalog read. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Network error. Please check your internet connection.")]
    Network { detail: String },
    #[error("Invalid API key. Please check your TMDb API key.")]
    Auth,
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Movie not found.")]
    NotFound,
    #[error("{}", upstream_message(*status))]
    Upstream { status: u16 },
    #[error("Unexpected response from the catalog: {0}")]
    Malformed(String),
}

fn upstream_message(status: u16) -> String {
    if status == 500 {
        "Server error. Please try again later.".to_string()
    } else {
        format!("Server error: {status}")
    }
}

impl CatalogError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Auth,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            _ => Self::Upstream { status },
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } => ErrorCode::Network,
            Self::Auth => ErrorCode::Unauthorized,
            Self::RateLimited => ErrorCode::RateLimited,
            Self::NotFound => ErrorCode::NotFound,
            Self::Upstream { .. } => ErrorCode::Upstream,
            Self::Malformed(_) => ErrorCode::Malformed,
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
