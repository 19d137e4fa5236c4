use anyhow::Result;
use async_trait::async_trait;
use movie_enrich::dataset::{
    join_records, load_or_create_table, read_links, BaseTable, EnrichmentTable, JoinedRecord,
    TableOrigin,
};
use movie_enrich::enrichment::{CsvSnapshot, EnrichmentRunner, RunnerConfig, SnapshotSink};
use movie_enrich::tmdb::{
    LookupError, MovieLookup, ProductionCompany, ProductionCountry, TmdbClient, TmdbClientOptions,
    TmdbMovie,
};
use serde_json::json;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// CSV snapshot that also counts how often it was overwritten.
struct CountingSnapshot {
    inner: CsvSnapshot,
    writes: usize,
}

impl SnapshotSink for CountingSnapshot {
    fn persist(&mut self, table: &EnrichmentTable) -> Result<()> {
        self.writes += 1;
        self.inner.persist(table)
    }
}

/// 125 movies, the last five without a TMDB id; movie i maps to tmdb 1000 + i.
fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let mut movies = String::from("movieId,title,genres\n");
    let mut links = String::from("movieId,imdbId,tmdbId\n");
    for i in 1..=125 {
        movies.push_str(&format!("{i},Movie {i} (1995),Drama\n"));
        if i <= 120 {
            links.push_str(&format!("{i},{:07},{}.0\n", 100000 + i, 1000 + i));
        } else {
            links.push_str(&format!("{i},{:07},\n", 100000 + i));
        }
    }
    let movies_path = dir.join("movies.csv");
    let links_path = dir.join("links.csv");
    std::fs::write(&movies_path, movies).unwrap();
    std::fs::write(&links_path, links).unwrap();
    (movies_path, links_path)
}

fn load(dir: &Path) -> (BaseTable, Vec<JoinedRecord>) {
    let (movies, links) = write_inputs(dir);
    let base = BaseTable::read_csv(&movies).unwrap();
    let records = join_records(&base, &read_links(&links).unwrap());
    (base, records)
}

fn config(start_offset: usize, max_batches: Option<usize>) -> RunnerConfig {
    RunnerConfig {
        batch_size: NonZeroUsize::new(50).unwrap(),
        start_offset,
        batch_delay: Duration::ZERO,
        max_batches,
    }
}

#[tokio::test]
async fn enriches_120_records_in_three_batches_through_tmdb() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/3/movie/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "budget": 0,
            "revenue": 500,
            "vote_average": 7.2,
            "vote_count": 340,
            "production_companies": [{"name": "A"}],
            "production_countries": [{"iso_3166_1": "US"}],
            "poster_path": "/x.jpg"
        })))
        .mount(&server)
        .await;
    let client = TmdbClient::new(TmdbClientOptions {
        base_url: format!("{}/3", server.uri()),
        token: "token".into(),
        timeout_secs: Some(5),
    })
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let (base, records) = load(dir.path());
    assert_eq!(records.len(), 120);
    assert!(records.iter().all(|r| r.external_id == 1000 + r.local_id));

    let snapshot = dir.path().join("movies_enrichment.csv");
    let (mut table, origin) = load_or_create_table(&snapshot, &base).unwrap();
    assert_eq!(origin, TableOrigin::Fresh);

    let mut sink = CountingSnapshot {
        inner: CsvSnapshot::new(&snapshot),
        writes: 0,
    };
    let summary = EnrichmentRunner::new(config(0, None))
        .run(&mut table, &records, &client, &mut sink)
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.attempted, 120);
    assert_eq!(summary.enriched, 120);
    assert_eq!(summary.next_offset, 120);
    assert_eq!(sink.writes, 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 120);

    let on_disk = EnrichmentTable::read_csv(&snapshot).unwrap();
    assert_eq!(on_disk, table);
    assert_eq!(on_disk.len(), 125);

    let f = on_disk.fields(7).unwrap();
    assert_eq!(f.budget, None);
    assert_eq!(f.revenue, Some(500));
    assert_eq!(f.vote_average, Some(7.2));
    assert_eq!(f.vote_count, Some(340));
    assert_eq!(f.production_companies, vec!["A"]);
    assert_eq!(f.production_countries, vec!["US"]);
    assert_eq!(f.poster_path.as_deref(), Some("/x.jpg"));

    // unmapped movies stay in the table but are never fetched
    assert!(on_disk.fields(121).unwrap().is_missing());

    let text = std::fs::read_to_string(&snapshot).unwrap();
    assert!(text.contains("\n7,Movie 7 (1995),Drama,,500,7.2,340,A,US,/x.jpg\n"));
}

/// Deterministic per-id responses; every seventh id fails.
struct ScriptedLookup;

#[async_trait]
impl MovieLookup for ScriptedLookup {
    async fn fetch_movie(&self, external_id: i64) -> Result<TmdbMovie, LookupError> {
        if external_id % 7 == 0 {
            return Err(LookupError::Status {
                status: 503,
                body: "try later".into(),
            });
        }
        Ok(TmdbMovie {
            budget: Some((external_id * 1000) as f64),
            revenue: Some(0.0),
            vote_average: Some((external_id % 10) as f64 + 0.5),
            vote_count: Some(external_id as f64),
            production_companies: vec![
                ProductionCompany {
                    name: format!("Studio {external_id}"),
                },
                ProductionCompany {
                    name: "Partner".into(),
                },
            ],
            production_countries: vec![ProductionCountry {
                iso_3166_1: "FR".into(),
            }],
            poster_path: None,
        })
    }
}

#[tokio::test]
async fn resuming_from_offset_matches_an_uninterrupted_run() {
    // uninterrupted
    let full_dir = tempfile::tempdir().unwrap();
    let (base, records) = load(full_dir.path());
    let full_snapshot = full_dir.path().join("movies_enrichment.csv");
    let (mut table, _) = load_or_create_table(&full_snapshot, &base).unwrap();
    EnrichmentRunner::new(config(0, None))
        .run(
            &mut table,
            &records,
            &ScriptedLookup,
            &mut CsvSnapshot::new(&full_snapshot),
        )
        .await
        .unwrap();
    let uninterrupted = EnrichmentTable::read_csv(&full_snapshot).unwrap();

    // interrupted after the first batch, then restarted at offset 50
    let dir = tempfile::tempdir().unwrap();
    let (base, records) = load(dir.path());
    let snapshot = dir.path().join("movies_enrichment.csv");
    let (mut table, _) = load_or_create_table(&snapshot, &base).unwrap();
    let first = EnrichmentRunner::new(config(0, Some(1)))
        .run(
            &mut table,
            &records,
            &ScriptedLookup,
            &mut CsvSnapshot::new(&snapshot),
        )
        .await
        .unwrap();
    assert_eq!(first.next_offset, 50);
    drop(table);

    let (mut resumed, origin) = load_or_create_table(&snapshot, &base).unwrap();
    assert_eq!(origin, TableOrigin::Snapshot);
    assert!(resumed.fields(60).unwrap().is_missing());
    let mut sink = CountingSnapshot {
        inner: CsvSnapshot::new(&snapshot),
        writes: 0,
    };
    let second = EnrichmentRunner::new(config(first.next_offset, None))
        .run(&mut resumed, &records, &ScriptedLookup, &mut sink)
        .await
        .unwrap();
    assert_eq!(second.attempted, 70);
    assert_eq!(sink.writes, 2);

    let final_table = EnrichmentTable::read_csv(&snapshot).unwrap();
    assert_eq!(final_table, uninterrupted);

    // tmdb 1001 is a multiple of seven, so movie 1 failed and stays missing
    assert!(final_table.fields(1).unwrap().is_missing());
    let f = final_table.fields(2).unwrap();
    assert_eq!(f.budget, Some(1_002_000));
    assert_eq!(f.revenue, None);
    assert_eq!(f.production_companies, vec!["Studio 1002", "Partner"]);
}
