use anyhow::Result;
use clap::{Parser, Subcommand};
use movie_enrich::cli::{enrich, status};
use movie_enrich::util::env as env_util;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "movie-enrich", version, about = "Enrich a MovieLens dataset with TMDB metadata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch TMDB metadata batch by batch, writing the snapshot after every batch
    Run {
        /// Base movie table (env ENRICH_MOVIES_CSV, default data/movies.csv)
        #[arg(long)]
        movies: Option<PathBuf>,
        /// movieId -> tmdbId mapping table (env ENRICH_LINKS_CSV, default data/links.csv)
        #[arg(long)]
        links: Option<PathBuf>,
        /// Snapshot to resume from and overwrite (env ENRICH_SNAPSHOT_CSV)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Records per batch (env ENRICH_BATCH_SIZE, default 50)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Index of the first joined record to fetch (env ENRICH_START_OFFSET, default 0)
        #[arg(long)]
        start: Option<usize>,
        /// Pause between batches in milliseconds (env ENRICH_BATCH_DELAY_MS, default 1500)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Stop after this many batches (env ENRICH_MAX_BATCHES)
        #[arg(long)]
        max_batches: Option<usize>,
        /// TMDB API root (env TMDB_BASE_URL, default https://api.themoviedb.org/3)
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print enrichment coverage of the current snapshot
    Status {
        /// Snapshot to inspect (env ENRICH_SNAPSHOT_CSV)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    movie_enrich::logging::init_tracing("info", env_util::env_flag("LOG_LOCATIONS", false))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            movies,
            links,
            snapshot,
            batch_size,
            start,
            delay_ms,
            max_batches,
            base_url,
        } => {
            let cfg = enrich::EnrichConfig {
                movies,
                links,
                snapshot,
                batch_size,
                start_offset: start,
                delay_ms,
                max_batches,
                base_url,
            };
            let summary = enrich::run(cfg).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Status { snapshot } => {
            status::run(status::StatusConfig { snapshot }).await?;
        }
    }
    Ok(())
}
