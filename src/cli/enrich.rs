use anyhow::{bail, Context, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::dataset::{join_records, load_or_create_table, read_links, BaseTable, TableOrigin};
use crate::enrichment::runner::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE};
use crate::enrichment::{CsvSnapshot, EnrichmentRunner, RunSummary, RunnerConfig};
use crate::tmdb::{TmdbClient, TmdbClientOptions, DEFAULT_BASE_URL};
use crate::util::env as env_util;

use super::{snapshot_path, DEFAULT_LINKS_CSV, DEFAULT_MOVIES_CSV};

/// Overrides from the command line; anything left `None` falls back to env, then defaults.
#[derive(Debug, Clone, Default)]
pub struct EnrichConfig {
    pub movies: Option<PathBuf>,
    pub links: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub start_offset: Option<usize>,
    pub delay_ms: Option<u64>,
    pub max_batches: Option<usize>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedEnrichConfig {
    pub movies: PathBuf,
    pub links: PathBuf,
    pub snapshot: PathBuf,
    pub runner: RunnerConfig,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl EnrichConfig {
    pub fn resolve(self) -> Result<ResolvedEnrichConfig> {
        let path = |explicit: Option<PathBuf>, key: &str, default: &str| -> PathBuf {
            explicit
                .or_else(|| env_util::env_opt(key).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(default))
        };

        let batch_size = self
            .batch_size
            .unwrap_or_else(|| env_util::env_parse("ENRICH_BATCH_SIZE", DEFAULT_BATCH_SIZE));
        let Some(batch_size) = NonZeroUsize::new(batch_size) else {
            bail!("batch size must be at least 1");
        };
        let delay_ms = self.delay_ms.unwrap_or_else(|| {
            env_util::env_parse("ENRICH_BATCH_DELAY_MS", DEFAULT_BATCH_DELAY.as_millis() as u64)
        });

        Ok(ResolvedEnrichConfig {
            movies: path(self.movies, "ENRICH_MOVIES_CSV", DEFAULT_MOVIES_CSV),
            links: path(self.links, "ENRICH_LINKS_CSV", DEFAULT_LINKS_CSV),
            snapshot: snapshot_path(self.snapshot),
            runner: RunnerConfig {
                batch_size,
                start_offset: self
                    .start_offset
                    .unwrap_or_else(|| env_util::env_parse("ENRICH_START_OFFSET", 0usize)),
                batch_delay: Duration::from_millis(delay_ms),
                max_batches: self
                    .max_batches
                    .or_else(|| env_util::env_parse_opt("ENRICH_MAX_BATCHES")),
            },
            base_url: self
                .base_url
                .or_else(|| env_util::env_opt("TMDB_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs: env_util::env_parse("TMDB_TIMEOUT_SECS", 15u64),
        })
    }
}

/// One enrichment pass: load, join, resume or start fresh, then run every batch.
pub async fn run(cfg: EnrichConfig) -> Result<RunSummary> {
    env_util::init_env();
    env_util::preflight_check(
        "enrich",
        &["TMDB_API_TOKEN"],
        &[
            "TMDB_API_TOKEN",
            "TMDB_BASE_URL",
            "ENRICH_BATCH_SIZE",
            "ENRICH_START_OFFSET",
            "ENRICH_BATCH_DELAY_MS",
        ],
    )?;
    let cfg = cfg.resolve()?;

    let client = TmdbClient::new(TmdbClientOptions {
        base_url: cfg.base_url.clone(),
        token: env_util::tmdb_token()?,
        timeout_secs: Some(cfg.timeout_secs),
    })
    .context("build TMDB client")?;

    let base = BaseTable::read_csv(&cfg.movies)?;
    let links = read_links(&cfg.links)?;
    let records = join_records(&base, &links);
    info!(
        movies = base.rows.len(),
        joined = records.len(),
        start = cfg.runner.start_offset,
        batch_size = cfg.runner.batch_size.get(),
        "dataset loaded"
    );

    let (mut table, origin) = load_or_create_table(&cfg.snapshot, &base)?;
    if origin == TableOrigin::Snapshot && cfg.runner.start_offset == 0 {
        info!("snapshot loaded with start offset 0; already enriched rows will be fetched again");
    }

    let mut sink = CsvSnapshot::new(cfg.snapshot.clone());
    let summary = EnrichmentRunner::new(cfg.runner)
        .run(&mut table, &records, &client, &mut sink)
        .await?;
    Ok(summary)
}
