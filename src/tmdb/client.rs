use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{LookupError, MovieLookup, TmdbMovie};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct TmdbClientOptions {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: Option<u64>,
}

/// Bearer-authenticated client for `GET /movie/{id}`.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    base_url: String,
    token: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(options: TmdbClientOptions) -> Result<Self> {
        let parsed = Url::parse(options.base_url.trim())
            .with_context(|| format!("invalid TMDB base URL {:?}", options.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("TMDB base URL must be http(s), got {}", parsed.scheme());
        }
        if options.token.trim().is_empty() {
            return Err(anyhow!("TMDB bearer token is empty"));
        }
        let timeout_secs = options.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http = Client::builder()
            .user_agent(concat!("movie-enrich/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: options.base_url.trim().trim_end_matches('/').to_string(),
            token: options.token.trim().to_string(),
            http,
        })
    }

    pub fn movie_url(&self, external_id: i64) -> String {
        format!("{}/movie/{}", self.base_url, external_id)
    }
}

#[async_trait]
impl MovieLookup for TmdbClient {
    async fn fetch_movie(&self, external_id: i64) -> Result<TmdbMovie, LookupError> {
        let url = self.movie_url(external_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = resp.bytes().await?;
        let movie: TmdbMovie = serde_json::from_slice(&bytes)?;
        debug!(external_id, "movie document decoded");
        Ok(movie)
    }

    fn lookup_url(&self, external_id: i64) -> Option<String> {
        Some(self.movie_url(external_id))
    }
}
