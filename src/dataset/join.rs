use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use super::table::EnrichmentTable;

pub const LOCAL_ID_COLUMN: &str = "movieId";
pub const EXTERNAL_ID_COLUMN: &str = "tmdbId";
pub const TITLE_COLUMN: &str = "title";

/// Parse an integral id, accepting float renderings such as `862.0` that
/// appear when a column had gaps in an earlier export.
pub fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseRow {
    pub local_id: i64,
    pub values: Vec<String>,
}

/// The base movie table, all columns kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseTable {
    pub headers: Vec<String>,
    pub rows: Vec<BaseRow>,
    title_idx: Option<usize>,
}

impl BaseTable {
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::from_reader(BufReader::new(file)).with_context(|| format!("read {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let idx_local = headers
            .iter()
            .position(|h| h == LOCAL_ID_COLUMN)
            .ok_or_else(|| anyhow!("{LOCAL_ID_COLUMN} col missing"))?;
        let title_idx = headers.iter().position(|h| h == TITLE_COLUMN);

        let mut rows = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut rec = StringRecord::new();
        let mut line = 1u64;
        while rdr.read_record(&mut rec)? {
            line += 1;
            let local_id = parse_integral(&rec[idx_local]).ok_or_else(|| {
                anyhow!("line {line}: bad {LOCAL_ID_COLUMN} {:?}", &rec[idx_local])
            })?;
            if !seen.insert(local_id) {
                warn!(local_id, line, "duplicate movieId in base table; keeping first row");
                continue;
            }
            rows.push(BaseRow {
                local_id,
                values: rec.iter().map(str::to_string).collect(),
            });
        }

        Ok(Self {
            headers,
            rows,
            title_idx,
        })
    }

    pub fn title_of<'a>(&self, row: &'a BaseRow) -> Option<&'a str> {
        self.title_idx
            .and_then(|i| row.values.get(i))
            .map(String::as_str)
    }
}

/// A base record with a usable TMDB id.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub local_id: i64,
    pub external_id: i64,
    pub title: Option<String>,
}

pub fn read_links(path: &Path) -> Result<HashMap<i64, i64>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    links_from_reader(BufReader::new(file)).with_context(|| format!("read {}", path.display()))
}

/// movieId -> tmdbId. Rows whose tmdbId is blank or not integral are unmapped.
pub fn links_from_reader<R: Read>(reader: R) -> Result<HashMap<i64, i64>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let idx_local = headers
        .iter()
        .position(|h| h == LOCAL_ID_COLUMN)
        .ok_or_else(|| anyhow!("{LOCAL_ID_COLUMN} col missing"))?;
    let idx_external = headers
        .iter()
        .position(|h| h == EXTERNAL_ID_COLUMN)
        .ok_or_else(|| anyhow!("{EXTERNAL_ID_COLUMN} col missing"))?;

    let mut links = HashMap::new();
    let mut unmapped = 0usize;
    for rec in rdr.records() {
        let rec = rec?;
        match (
            parse_integral(&rec[idx_local]),
            parse_integral(&rec[idx_external]),
        ) {
            (Some(local), Some(external)) => {
                links.entry(local).or_insert(external);
            }
            _ => unmapped += 1,
        }
    }
    debug!(mapped = links.len(), unmapped, "links loaded");
    Ok(links)
}

/// Inner join in base order; records without a mapping are dropped silently.
pub fn join_records(base: &BaseTable, links: &HashMap<i64, i64>) -> Vec<JoinedRecord> {
    let joined: Vec<JoinedRecord> = base
        .rows
        .iter()
        .filter_map(|row| {
            links.get(&row.local_id).map(|&external_id| JoinedRecord {
                local_id: row.local_id,
                external_id,
                title: base.title_of(row).map(str::to_string),
            })
        })
        .collect();
    debug!(
        base = base.rows.len(),
        joined = joined.len(),
        dropped = base.rows.len() - joined.len(),
        "base joined with links"
    );
    joined
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOrigin {
    Fresh,
    Snapshot,
}

/// Resume from the snapshot when it exists, otherwise start a fresh table.
/// A loaded snapshot is used as-is and is not reconciled with `base`.
pub fn load_or_create_table(
    snapshot: &Path,
    base: &BaseTable,
) -> Result<(EnrichmentTable, TableOrigin)> {
    if snapshot.is_file() {
        let table = EnrichmentTable::read_csv(snapshot)?;
        info!(
            path = %snapshot.display(),
            rows = table.len(),
            "resuming from existing snapshot"
        );
        return Ok((table, TableOrigin::Snapshot));
    }
    info!(rows = base.rows.len(), "no snapshot found; starting fresh table");
    Ok((EnrichmentTable::from_base(base), TableOrigin::Fresh))
}
