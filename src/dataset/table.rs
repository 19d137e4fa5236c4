use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::warn;

use super::join::{parse_integral, BaseTable, LOCAL_ID_COLUMN};

/// Separator used to flatten multi-valued fields into one CSV cell.
pub const MULTI_VALUE_DELIMITER: char = '|';

pub const COL_BUDGET: &str = "tmdb_budget";
pub const COL_REVENUE: &str = "tmdb_revenue";
pub const COL_VOTE_AVG: &str = "tmdb_vote_avg";
pub const COL_VOTE_COUNT: &str = "tmdb_vote_count";
pub const COL_COMPANY_NAMES: &str = "tmdb_companie_name";
pub const COL_COMPANY_ISO: &str = "tmdb_companie_iso";
pub const COL_POSTER_PATH: &str = "tmdb_poster_path";

/// Enrichment columns, in the order they are appended after the base columns.
pub const ENRICHMENT_COLUMNS: [&str; 7] = [
    COL_BUDGET,
    COL_REVENUE,
    COL_VOTE_AVG,
    COL_VOTE_COUNT,
    COL_COMPANY_NAMES,
    COL_COMPANY_ISO,
    COL_POSTER_PATH,
];

/// Values fetched from TMDB for one movie. `None` / empty list is the missing
/// sentinel and is written as an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentFields {
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub production_companies: Vec<String>,
    pub production_countries: Vec<String>,
    pub poster_path: Option<String>,
}

impl EnrichmentFields {
    pub fn is_missing(&self) -> bool {
        *self == Self::default()
    }

    fn to_cells(&self) -> [String; 7] {
        fn num<T: ToString>(v: Option<T>) -> String {
            v.map(|v| v.to_string()).unwrap_or_default()
        }
        [
            num(self.budget),
            num(self.revenue),
            num(self.vote_average),
            num(self.vote_count),
            join_multi(&self.production_companies),
            join_multi(&self.production_countries),
            self.poster_path.clone().unwrap_or_default(),
        ]
    }

    fn from_cells(cells: [&str; 7]) -> Result<Self> {
        let [budget, revenue, vote_avg, vote_count, companies, countries, poster] = cells;
        Ok(Self {
            budget: parse_integral_cell(COL_BUDGET, budget)?,
            revenue: parse_integral_cell(COL_REVENUE, revenue)?,
            vote_average: parse_float_cell(COL_VOTE_AVG, vote_avg)?,
            vote_count: parse_integral_cell(COL_VOTE_COUNT, vote_count)?,
            production_companies: split_multi(companies),
            production_countries: split_multi(countries),
            poster_path: Some(poster.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        })
    }
}

/// Join values with `|`, preserving order. No values is an empty cell.
pub fn join_multi(values: &[String]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(MULTI_VALUE_DELIMITER);
        }
        out.push_str(v);
    }
    out
}

/// Inverse of [`join_multi`]; an empty cell yields no values.
pub fn split_multi(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }
    cell.split(MULTI_VALUE_DELIMITER).map(str::to_string).collect()
}

fn parse_integral_cell(column: &str, raw: &str) -> Result<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    parse_integral(raw)
        .map(Some)
        .ok_or_else(|| anyhow!("{column}: expected an integer, got {raw:?}"))
}

fn parse_float_cell(column: &str, raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| anyhow!("{column}: expected a number, got {raw:?}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Base column values, aligned with [`EnrichmentTable::base_headers`].
    pub base: Vec<String>,
    pub fields: EnrichmentFields,
}

/// Per-column fill counts of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub rows: usize,
    pub enriched_rows: usize,
    pub budget: usize,
    pub revenue: usize,
    pub vote_average: usize,
    pub vote_count: usize,
    pub production_companies: usize,
    pub production_countries: usize,
    pub poster_path: usize,
}

/// Every base record plus its enrichment columns, keyed by `movieId` in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentTable {
    base_headers: Vec<String>,
    rows: IndexMap<i64, TableRow>,
}

impl EnrichmentTable {
    /// Fresh table: all base rows, every enrichment field missing.
    pub fn from_base(base: &BaseTable) -> Self {
        let rows = base
            .rows
            .iter()
            .map(|row| {
                (
                    row.local_id,
                    TableRow {
                        base: row.values.clone(),
                        fields: EnrichmentFields::default(),
                    },
                )
            })
            .collect();
        Self {
            base_headers: base.headers.clone(),
            rows,
        }
    }

    pub fn base_headers(&self) -> &[String] {
        &self.base_headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, local_id: i64) -> Option<&TableRow> {
        self.rows.get(&local_id)
    }

    pub fn fields(&self, local_id: i64) -> Option<&EnrichmentFields> {
        self.rows.get(&local_id).map(|r| &r.fields)
    }

    pub fn rows(&self) -> impl Iterator<Item = (i64, &TableRow)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    /// Overwrite the enrichment fields of one row. Returns false when no row has that id.
    pub fn apply(&mut self, local_id: i64, fields: EnrichmentFields) -> bool {
        match self.rows.get_mut(&local_id) {
            Some(row) => {
                row.fields = fields;
                true
            }
            None => false,
        }
    }

    pub fn coverage(&self) -> Coverage {
        let mut c = Coverage {
            rows: self.rows.len(),
            ..Coverage::default()
        };
        for row in self.rows.values() {
            let f = &row.fields;
            c.enriched_rows += usize::from(!f.is_missing());
            c.budget += usize::from(f.budget.is_some());
            c.revenue += usize::from(f.revenue.is_some());
            c.vote_average += usize::from(f.vote_average.is_some());
            c.vote_count += usize::from(f.vote_count.is_some());
            c.production_companies += usize::from(!f.production_companies.is_empty());
            c.production_countries += usize::from(!f.production_countries.is_empty());
            c.poster_path += usize::from(f.poster_path.is_some());
        }
        c
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open snapshot {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("read snapshot {}", path.display()))
    }

    /// Parse a snapshot: base columns are every column that is not an enrichment column.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let idx_local = headers
            .iter()
            .position(|h| h == LOCAL_ID_COLUMN)
            .ok_or_else(|| anyhow!("{LOCAL_ID_COLUMN} col missing"))?;
        let mut enrichment_idx = [0usize; 7];
        for (slot, name) in enrichment_idx.iter_mut().zip(ENRICHMENT_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| anyhow!("{name} col missing"))?;
        }
        let base_idx: Vec<usize> = (0..headers.len())
            .filter(|i| !enrichment_idx.contains(i))
            .collect();
        let base_headers = base_idx.iter().map(|&i| headers[i].to_string()).collect();

        let mut rows = IndexMap::new();
        let mut rec = StringRecord::new();
        let mut line = 1u64;
        while rdr.read_record(&mut rec)? {
            line += 1;
            let local_id = parse_integral(&rec[idx_local])
                .ok_or_else(|| anyhow!("line {line}: bad {LOCAL_ID_COLUMN} {:?}", &rec[idx_local]))?;
            let fields = EnrichmentFields::from_cells(enrichment_idx.map(|i| &rec[i]))
                .with_context(|| format!("line {line}"))?;
            let base = base_idx.iter().map(|&i| rec[i].to_string()).collect();
            if rows.contains_key(&local_id) {
                warn!(local_id, line, "duplicate movieId in snapshot; keeping first row");
                continue;
            }
            rows.insert(local_id, TableRow { base, fields });
        }

        Ok(Self { base_headers, rows })
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        let header: Vec<&str> = self
            .base_headers
            .iter()
            .map(String::as_str)
            .chain(ENRICHMENT_COLUMNS)
            .collect();
        wtr.write_record(&header)?;
        for row in self.rows.values() {
            let cells = row.fields.to_cells();
            wtr.write_record(
                row.base
                    .iter()
                    .map(String::as_str)
                    .chain(cells.iter().map(String::as_str)),
            )?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
movieId,title,genres,tmdb_budget,tmdb_revenue,tmdb_vote_avg,tmdb_vote_count,tmdb_companie_name,tmdb_companie_iso,tmdb_poster_path
1,Toy Story (1995),Adventure|Animation,30000000.0,373554033.0,7.7,5415.0,Pixar Animation Studios,US,/rhIRbceoE9lR4veEXuwCC2wARtG.jpg
2,Jumanji (1995),Adventure|Children,,,,,,,
";

    #[test]
    fn reads_pandas_style_snapshot() {
        let table = EnrichmentTable::from_reader(SNAPSHOT.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.base_headers(), ["movieId", "title", "genres"]);

        let toy = table.fields(1).unwrap();
        assert_eq!(toy.budget, Some(30_000_000));
        assert_eq!(toy.revenue, Some(373_554_033));
        assert_eq!(toy.vote_average, Some(7.7));
        assert_eq!(toy.vote_count, Some(5415));
        assert_eq!(toy.production_companies, vec!["Pixar Animation Studios"]);
        assert_eq!(toy.production_countries, vec!["US"]);

        assert!(table.fields(2).unwrap().is_missing());
        assert_eq!(table.row(2).unwrap().base[2], "Adventure|Children");
    }

    #[test]
    fn write_then_read_preserves_table() {
        let mut table = EnrichmentTable::from_reader(SNAPSHOT.as_bytes()).unwrap();
        table.apply(
            2,
            EnrichmentFields {
                revenue: Some(262_797_249),
                vote_average: Some(6.9),
                production_companies: vec!["TriStar Pictures".into(), "Teitler Film".into()],
                production_countries: vec!["US".into(), "CA".into()],
                ..EnrichmentFields::default()
            },
        );

        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("movieId,title,genres,tmdb_budget,"));
        assert!(text.contains("TriStar Pictures|Teitler Film,US|CA,"));

        let reread = EnrichmentTable::from_reader(out.as_slice()).unwrap();
        assert_eq!(reread, table);
    }

    #[test]
    fn multi_values_round_trip_in_order() {
        let values = vec!["Lucasfilm".to_string(), "20th Century Fox".to_string()];
        assert_eq!(join_multi(&values), "Lucasfilm|20th Century Fox");
        assert_eq!(split_multi(&join_multi(&values)), values);
        assert_eq!(join_multi(&[]), "");
        assert!(split_multi("").is_empty());
    }

    #[test]
    fn apply_ignores_unknown_ids() {
        let mut table = EnrichmentTable::from_reader(SNAPSHOT.as_bytes()).unwrap();
        let before = table.clone();
        assert!(!table.apply(99, EnrichmentFields::default()));
        assert_eq!(table, before);
    }

    #[test]
    fn coverage_counts_filled_columns() {
        let c = EnrichmentTable::from_reader(SNAPSHOT.as_bytes())
            .unwrap()
            .coverage();
        assert_eq!(c.rows, 2);
        assert_eq!(c.enriched_rows, 1);
        assert_eq!(c.budget, 1);
        assert_eq!(c.poster_path, 1);
    }

    #[test]
    fn snapshot_without_enrichment_columns_is_rejected() {
        let err = EnrichmentTable::from_reader("movieId,title\n1,x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("tmdb_budget"));
    }

    #[test]
    fn nan_cells_read_as_missing() {
        let raw = "movieId,title,tmdb_budget,tmdb_revenue,tmdb_vote_avg,tmdb_vote_count,tmdb_companie_name,tmdb_companie_iso,tmdb_poster_path\n\
                   1,x,nan,NaN,nan,NAN,,,\n";
        let table = EnrichmentTable::from_reader(raw.as_bytes()).unwrap();
        assert!(table.fields(1).unwrap().is_missing());
    }

    #[test]
    fn bad_numeric_cell_is_rejected() {
        let raw = SNAPSHOT.replace("5415.0", "lots");
        assert!(EnrichmentTable::from_reader(raw.as_bytes()).is_err());
    }
}
