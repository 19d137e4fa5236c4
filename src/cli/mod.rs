pub mod enrich;
pub mod status;

pub const DEFAULT_MOVIES_CSV: &str = "data/movies.csv";
pub const DEFAULT_LINKS_CSV: &str = "data/links.csv";
pub const DEFAULT_SNAPSHOT_CSV: &str = "data/movies_enrichment.csv";

/// Snapshot path: explicit override, then `ENRICH_SNAPSHOT_CSV`, then the default.
pub(crate) fn snapshot_path(explicit: Option<std::path::PathBuf>) -> std::path::PathBuf {
    explicit
        .or_else(|| crate::util::env::env_opt("ENRICH_SNAPSHOT_CSV").map(Into::into))
        .unwrap_or_else(|| DEFAULT_SNAPSHOT_CSV.into())
}
