use anyhow::{bail, Result};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::dataset::EnrichmentTable;
use crate::util::env as env_util;

use super::snapshot_path;

#[derive(Debug, Clone, Default)]
pub struct StatusConfig {
    /// Optional override for the snapshot path.
    pub snapshot: Option<PathBuf>,
}

/// Print per-column coverage of the current snapshot as JSON.
pub async fn run(cfg: StatusConfig) -> Result<()> {
    env_util::init_env();
    let path = snapshot_path(cfg.snapshot);
    if !path.is_file() {
        bail!("no snapshot at {}; run `movie-enrich run` first", path.display());
    }
    let table = EnrichmentTable::read_csv(&path)?;
    let out = json!({
        "snapshot": path.display().to_string(),
        "coverage": table.coverage(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    info!("status done");
    Ok(())
}
