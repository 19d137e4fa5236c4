use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::batch::{plan_batches, Batch};
use super::snapshot::SnapshotSink;
use crate::dataset::{EnrichmentTable, JoinedRecord};
use crate::normalization::normalize_movie;
use crate::tmdb::MovieLookup;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub batch_size: NonZeroUsize,
    /// Index into the joined records of the first record to fetch.
    pub start_offset: usize,
    /// Pause between batches, courtesy to the remote service.
    pub batch_delay: Duration,
    /// Stop after this many batches; `None` runs to the end.
    pub max_batches: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub batches: usize,
    pub attempted: usize,
    pub enriched: usize,
    pub failed: usize,
    /// Lookups that succeeded for a movie the loaded table has no row for.
    pub unmatched: usize,
    /// Offset to pass on the next run to continue after the last persisted batch.
    pub next_offset: usize,
    pub elapsed_ms: i64,
}

/// Sequential fetch-and-merge loop over fixed-size batches.
#[derive(Debug, Clone)]
pub struct EnrichmentRunner {
    config: RunnerConfig,
}

impl EnrichmentRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Enrich `records` batch by batch, persisting `table` through `sink` after each one.
    ///
    /// Lookup failures leave the row untouched and are only logged; a sink
    /// failure aborts the run with earlier snapshots intact.
    #[instrument(
        skip_all,
        fields(
            start = self.config.start_offset,
            batch_size = self.config.batch_size.get(),
            records = records.len()
        )
    )]
    pub async fn run<L, S>(
        &self,
        table: &mut EnrichmentTable,
        records: &[JoinedRecord],
        lookup: &L,
        sink: &mut S,
    ) -> Result<RunSummary>
    where
        L: MovieLookup + ?Sized,
        S: SnapshotSink + ?Sized,
    {
        let started = Utc::now();
        let mut batches = plan_batches(records, self.config.start_offset, self.config.batch_size);
        if let Some(max) = self.config.max_batches {
            batches.truncate(max);
        }
        if batches.is_empty() {
            warn!(
                start = self.config.start_offset,
                records = records.len(),
                "start offset leaves nothing to enrich"
            );
        }

        let mut summary = RunSummary {
            next_offset: self.config.start_offset,
            ..RunSummary::default()
        };
        let total = batches.len();
        for batch in &batches {
            self.run_batch(table, batch, lookup, &mut summary).await;

            sink.persist(table)
                .with_context(|| format!("persist snapshot after batch #{}", batch.ordinal))?;
            summary.batches += 1;
            summary.next_offset = batch.end_offset();

            let last_batch = batch.ordinal + 1 == total;
            info!(
                batch = batch.ordinal,
                last_movie_id = ?batch.last_local_id(),
                next_offset = summary.next_offset,
                "end of batch"
            );
            if !last_batch && !self.config.batch_delay.is_zero() {
                info!(
                    delay_ms = self.config.batch_delay.as_millis() as u64,
                    "sleeping before next batch"
                );
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        summary.elapsed_ms = (Utc::now() - started).num_milliseconds();
        info!(
            batches = summary.batches,
            attempted = summary.attempted,
            enriched = summary.enriched,
            failed = summary.failed,
            unmatched = summary.unmatched,
            next_offset = summary.next_offset,
            elapsed_ms = summary.elapsed_ms,
            "enrichment run finished"
        );
        Ok(summary)
    }

    async fn run_batch<L>(
        &self,
        table: &mut EnrichmentTable,
        batch: &Batch<'_>,
        lookup: &L,
        summary: &mut RunSummary,
    ) where
        L: MovieLookup + ?Sized,
    {
        info!(
            batch = batch.ordinal,
            offset = batch.offset,
            size = batch.records.len(),
            first_movie_id = ?batch.first_local_id(),
            "start of batch"
        );
        for record in batch.records {
            summary.attempted += 1;
            let url = lookup.lookup_url(record.external_id);
            info!(
                url = url.as_deref().unwrap_or(""),
                tmdb_id = record.external_id,
                movie_id = record.local_id,
                title = record.title.as_deref().unwrap_or(""),
                "fetching movie"
            );
            match lookup.fetch_movie(record.external_id).await {
                Ok(movie) => {
                    let fields = normalize_movie(&movie);
                    debug!(movie_id = record.local_id, ?fields, "normalized");
                    if table.apply(record.local_id, fields) {
                        summary.enriched += 1;
                    } else {
                        summary.unmatched += 1;
                        warn!(
                            movie_id = record.local_id,
                            "no row for movie in the loaded table; result dropped"
                        );
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        tmdb_id = record.external_id,
                        movie_id = record.local_id,
                        status = ?err.status(),
                        error = %err,
                        "lookup failed; row left unchanged"
                    );
                }
            }
        }
    }
}
