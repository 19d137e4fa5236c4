use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

use crate::dataset::EnrichmentTable;

/// Destination for the full table after each batch.
pub trait SnapshotSink {
    fn persist(&mut self, table: &EnrichmentTable) -> Result<()>;
}

/// Overwrites one CSV file. The table is written to a sibling temp file and
/// renamed into place, so the previous snapshot stays intact until the new one is complete.
#[derive(Debug, Clone)]
pub struct CsvSnapshot {
    path: PathBuf,
}

impl CsvSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotSink for CsvSnapshot {
    fn persist(&mut self, table: &EnrichmentTable) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = self.temp_path();
        let file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut writer = BufWriter::with_capacity(1 << 20, file);
        table.write_to(&mut writer)?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()
            .with_context(|| format!("sync {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("rename {} -> {}", tmp.display(), self.path.display())
        })?;
        debug!(path = %self.path.display(), rows = table.len(), "snapshot written");
        Ok(())
    }
}
