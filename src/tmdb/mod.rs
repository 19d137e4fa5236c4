//! TMDB lookup seam: the trait the runner depends on, its error taxonomy, and
//! the reqwest-backed client used in production.
pub mod client;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{TmdbClient, TmdbClientOptions, DEFAULT_BASE_URL};
pub use models::{ProductionCompany, ProductionCountry, TmdbMovie};

/// Why a single movie lookup produced no usable document.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed movie document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl LookupError {
    /// HTTP status when the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            LookupError::Status { status, .. } => Some(*status),
            LookupError::Transport(err) => err.status().map(|s| s.as_u16()),
            LookupError::Malformed(_) => None,
        }
    }
}

/// One remote lookup per external identifier.
#[async_trait]
pub trait MovieLookup: Send + Sync {
    async fn fetch_movie(&self, external_id: i64) -> Result<TmdbMovie, LookupError>;

    /// Where the lookup for `external_id` goes, for progress output.
    fn lookup_url(&self, _external_id: i64) -> Option<String> {
        None
    }
}
