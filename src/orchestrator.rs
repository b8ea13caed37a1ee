use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, Severity};
use crate::fetch::{fetch_upstream, load_upstream_file};
use crate::models::RawEventRecord;
use crate::out_models::Database;
use crate::reconcile::match_events;
use crate::render::render_database;
use crate::rules::RuleTables;
use crate::text_table::{SqliteTextTable, TextTable};

#[derive(Debug, Clone)]
pub enum UpstreamSource {
    Url(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub db_path: PathBuf,
    pub output: PathBuf,
    pub include_name: bool,
    pub upstream: UpstreamSource,
}

pub async fn run(cfg: &RunConfig) -> Result<()> {
    let pipeline_start = std::time::Instant::now();
    info!("Pipeline started - db={}, output={}", cfg.db_path.display(), cfg.output.display());

    // 1) upstream feed
    let records = match &cfg.upstream {
        UpstreamSource::Url(url) => {
            let client = Client::builder().build()?;
            fetch_upstream(&client, url).await?
        }
        UpstreamSource::File(path) => load_upstream_file(path)?,
    };

    // 2) authoritative table
    let table = SqliteTextTable::open(&cfg.db_path)
        .with_context(|| format!("Opening master database {}", cfg.db_path.display()))?;

    // 3) match + aggregate
    let match_start = std::time::Instant::now();
    let rules = RuleTables::builtin();
    let (db, diag) = build_database(&table, &rules, &records, cfg.include_name)?;
    diag.emit();
    info!(
        "Matching completed - duration={:.2}s, records={}, events={}, anomalies={}, warnings={}, errors={}",
        match_start.elapsed().as_secs_f32(),
        records.len(),
        db.events.len(),
        diag.entries().len(),
        diag.count(Severity::Warn),
        diag.count(Severity::Error)
    );

    // 4) persist
    write_database(&cfg.output, &db)?;

    info!(
        "Pipeline completed successfully - total_duration={:.2}s",
        pipeline_start.elapsed().as_secs_f32()
    );
    Ok(())
}

/// Everything between loading and writing; no I/O besides table reads.
pub fn build_database<T: TextTable>(
    table: &T,
    rules: &RuleTables,
    records: &[RawEventRecord],
    include_name: bool,
) -> Result<(Database, Diagnostics)> {
    let mut diag = Diagnostics::new();
    for conflict in rules.validate() {
        diag.report(conflict);
    }

    let events = match_events(table, rules, records, &mut diag)?;
    Ok((render_database(&events, include_name), diag))
}

pub fn write_database(path: &Path, db: &Database) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(db)?;
    std::fs::write(path, bytes).with_context(|| format!("Writing {}", path.display()))?;
    debug!("Wrote {} ({} events)", path.display(), db.events.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_table::{create_schema, MemoryTextTable};
    use rusqlite::{params, Connection};

    const FEED: &str = r#"window.eventDatas['男'] = [
{"e":"岐","n":"ナリタブライアン","c":"c","choices":[{"n":"上","t":"根性+10[br]スキルPt+15"}]},
{"e":"ダンスレッスン","n":"ナリタブライアン(新衣装)","c":"c","choices":[{"n":"下","t":"賢さ+10<hr>体力+5"}]},
{"e":"初詣","n":"共通","c":"m","choices":[{"n":"a","t":"b"}]},
{"e":"謎のイベント","n":"ナリタブライアン","c":"c","choices":[]},
];"#;

    const STORIES: &[(i64, i64, &str)] = &[
        (170, 1016, "ナリタブライアン"),
        (181, 501016121, "岐"),
        (181, 501016409, "岐"),
        (181, 501016506, "ダンスレッスン"),
        (181, 501001506, "ダンスレッスン"),
        (181, 400000001, "初詣"),
    ];

    fn memory_table() -> MemoryTextTable {
        let mut t = MemoryTextTable::new();
        for &(cat, idx, text) in STORIES {
            t.insert(cat, idx, text);
        }
        t
    }

    #[test]
    fn builds_expected_database() {
        let records = crate::fetch::parse_upstream(FEED).unwrap();
        let (db, diag) = build_database(&memory_table(), &RuleTables::builtin(), &records, true).unwrap();

        let ids: Vec<i64> = db.events.iter().map(|e| e.story_id).collect();
        assert_eq!(ids, vec![501016121, 501016409, 501016506]);
        assert_eq!(db.events[0].choices[0].text, "根性+10\nスキルPt+15");
        assert_eq!(db.events[2].choices[0].text, "賢さ+10\n体力+5");
        assert_eq!(db.events[2].story_name.as_deref(), Some("ダンスレッスン"));
        // unknown event + unused overrides
        assert_eq!(diag.count(Severity::Warn), 2);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let records = crate::fetch::parse_upstream(FEED).unwrap();
        let rules = RuleTables::builtin();
        let (a, _) = build_database(&memory_table(), &rules, &records, true).unwrap();
        let (b, _) = build_database(&memory_table(), &rules, &records, true).unwrap();
        assert_eq!(serde_json::to_vec_pretty(&a).unwrap(), serde_json::to_vec_pretty(&b).unwrap());
    }

    #[tokio::test]
    async fn run_end_to_end_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("master.mdb");
        let feed_path = dir.path().join("male_event_datas.js");
        let output = dir.path().join("cjedb.json");

        {
            let conn = Connection::open(&db_path).unwrap();
            create_schema(&conn).unwrap();
            for &(cat, idx, text) in STORIES {
                conn.execute(
                    r#"INSERT INTO text_data (id, category, "index", text) VALUES (?1, ?1, ?2, ?3)"#,
                    params![cat, idx, text],
                )
                .unwrap();
            }
        }
        std::fs::write(&feed_path, FEED).unwrap();

        let cfg = RunConfig {
            db_path,
            output: output.clone(),
            include_name: false,
            upstream: UpstreamSource::File(feed_path),
        };
        run(&cfg).await.unwrap();
        let first = std::fs::read(&output).unwrap();
        run(&cfg).await.unwrap();
        let second = std::fs::read(&output).unwrap();
        assert_eq!(first, second);

        let db: Database = serde_json::from_slice(&first).unwrap();
        assert_eq!(db.events.len(), 3);
        assert!(db.events.iter().all(|e| e.story_name.is_none()));
        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("\"storyId\": 501016121"));
        assert!(text.contains("根性+10"));
    }

    #[tokio::test]
    async fn run_fails_on_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let feed_path = dir.path().join("feed.json");
        std::fs::write(&feed_path, "[]").unwrap();
        let cfg = RunConfig {
            db_path: dir.path().join("missing.mdb"),
            output: dir.path().join("out.json"),
            include_name: false,
            upstream: UpstreamSource::File(feed_path),
        };
        assert!(run(&cfg).await.is_err());
    }
}
