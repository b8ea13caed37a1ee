use rusqlite::{params, Connection, OpenFlags};
#[cfg(test)]
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::models::TextEntry;

/// `text_data` category holding character names. Not 6, which lacks 桐生院葵.
pub const CHARA_NAME_CATEGORY: i64 = 170;
/// `text_data` category holding story (event) names.
pub const STORY_NAME_CATEGORY: i64 = 181;

#[derive(Debug, Error)]
pub enum TextTableError {
    #[error("failed to open {path}: {message}")]
    Open { path: String, message: String },
    #[error("sqlite error: {message}")]
    Sqlite { message: String },
}

impl From<rusqlite::Error> for TextTableError {
    fn from(e: rusqlite::Error) -> Self {
        TextTableError::Sqlite { message: e.to_string() }
    }
}

/// Lookup-by-category service over the `text_data` table of `master.mdb`.
/// Every method returns rows ordered by index.
pub trait TextTable {
    fn list(&self, category: i64) -> Result<Vec<TextEntry>, TextTableError>;
    fn find_exact(&self, category: i64, text: &str) -> Result<Vec<TextEntry>, TextTableError>;
    fn find_containing(&self, category: i64, needle: &str) -> Result<Vec<TextEntry>, TextTableError>;
}

pub struct SqliteTextTable {
    conn: Connection,
}

impl SqliteTextTable {
    pub fn open(path: &Path) -> Result<Self, TextTableError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
            TextTableError::Open { path: path.display().to_string(), message: e.to_string() }
        })?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<TextEntry>, TextTableError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(TextEntry { index: row.get(0)?, text: row.get(1)? })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl TextTable for SqliteTextTable {
    fn list(&self, category: i64) -> Result<Vec<TextEntry>, TextTableError> {
        self.query(
            r#"SELECT "index", text FROM text_data WHERE category = ?1 ORDER BY "index""#,
            params![category],
        )
    }

    fn find_exact(&self, category: i64, text: &str) -> Result<Vec<TextEntry>, TextTableError> {
        self.query(
            r#"SELECT "index", text FROM text_data
               WHERE category = ?1 AND text = ?2 ORDER BY "index""#,
            params![category, text],
        )
    }

    // instr() instead of LIKE: event names may contain '%' or '_'. Unlike
    // LIKE, instr() is case-sensitive for ASCII, so "ura" does not hit "URA".
    fn find_containing(&self, category: i64, needle: &str) -> Result<Vec<TextEntry>, TextTableError> {
        self.query(
            r#"SELECT "index", text FROM text_data
               WHERE category = ?1 AND instr(text, ?2) > 0 ORDER BY "index""#,
            params![category, needle],
        )
    }
}

/// In-memory table for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTextTable {
    rows: BTreeMap<i64, BTreeMap<i64, String>>, // category -> index -> text
}

#[cfg(test)]
impl MemoryTextTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: i64, index: i64, text: impl Into<String>) -> &mut Self {
        self.rows.entry(category).or_default().insert(index, text.into());
        self
    }

    fn filter(&self, category: i64, pred: impl Fn(&str) -> bool) -> Vec<TextEntry> {
        self.rows
            .get(&category)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(|(_, text)| pred(text))
            .map(|(&index, text)| TextEntry { index, text: text.clone() })
            .collect()
    }
}

#[cfg(test)]
impl TextTable for MemoryTextTable {
    fn list(&self, category: i64) -> Result<Vec<TextEntry>, TextTableError> {
        Ok(self.filter(category, |_| true))
    }

    fn find_exact(&self, category: i64, text: &str) -> Result<Vec<TextEntry>, TextTableError> {
        Ok(self.filter(category, |t| t == text))
    }

    fn find_containing(&self, category: i64, needle: &str) -> Result<Vec<TextEntry>, TextTableError> {
        Ok(self.filter(category, |t| t.contains(needle)))
    }
}

#[cfg(test)]
pub(crate) fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"CREATE TABLE text_data (
               id INTEGER NOT NULL,
               category INTEGER NOT NULL,
               "index" INTEGER NOT NULL,
               text TEXT NOT NULL,
               PRIMARY KEY(category, "index")
           );"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> SqliteTextTable {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let rows: &[(i64, i64, &str)] = &[
            (170, 1001, "スペシャルウィーク"),
            (170, 1002, "サイレンススズカ"),
            (181, 501001506, "ダンスレッスン"),
            (181, 501002506, "ダンスレッスン"),
            (181, 501001101, "日本一のウマ娘"),
            (181, 501001102, "100%の力"),
        ];
        for (cat, idx, text) in rows {
            conn.execute(
                r#"INSERT INTO text_data (id, category, "index", text) VALUES (?1, ?1, ?2, ?3)"#,
                params![cat, idx, text],
            )
            .unwrap();
        }
        SqliteTextTable::from_connection(conn)
    }

    #[test]
    fn sqlite_list_is_ordered_by_index() {
        let table = setup_db();
        let charas = table.list(CHARA_NAME_CATEGORY).unwrap();
        assert_eq!(charas.len(), 2);
        assert_eq!(charas[0].index, 1001);
        assert_eq!(charas[1].text, "サイレンススズカ");
    }

    #[test]
    fn sqlite_exact_returns_all_duplicates() {
        let table = setup_db();
        let hits = table.find_exact(STORY_NAME_CATEGORY, "ダンスレッスン").unwrap();
        let ids: Vec<i64> = hits.iter().map(|e| e.index).collect();
        assert_eq!(ids, vec![501001506, 501002506]);
        assert!(table.find_exact(CHARA_NAME_CATEGORY, "ダンスレッスン").unwrap().is_empty());
    }

    #[test]
    fn sqlite_containing_treats_wildcards_literally() {
        let table = setup_db();
        assert_eq!(table.find_containing(STORY_NAME_CATEGORY, "日本一").unwrap().len(), 1);
        assert_eq!(table.find_containing(STORY_NAME_CATEGORY, "0%").unwrap().len(), 1);
        assert!(table.find_containing(STORY_NAME_CATEGORY, "_").unwrap().is_empty());
    }

    #[test]
    fn sqlite_containing_is_case_sensitive() {
        let table = setup_db();
        let conn = &table.conn;
        conn.execute(
            r#"INSERT INTO text_data (id, category, "index", text) VALUES (181, 181, 400000101, 'URAファイナルズ')"#,
            [],
        )
        .unwrap();
        assert_eq!(table.find_containing(STORY_NAME_CATEGORY, "URA").unwrap().len(), 1);
        assert!(table.find_containing(STORY_NAME_CATEGORY, "ura").unwrap().is_empty());

        let mut memory = MemoryTextTable::new();
        memory.insert(181, 400000101, "URAファイナルズ");
        assert!(memory.find_containing(181, "ura").unwrap().is_empty());
    }

    #[test]
    fn sqlite_open_reads_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.mdb");
        {
            let conn = Connection::open(&path).unwrap();
            create_schema(&conn).unwrap();
            conn.execute(
                r#"INSERT INTO text_data (id, category, "index", text) VALUES (170, 170, 1001, 'スペシャルウィーク')"#,
                [],
            )
            .unwrap();
        }
        let table = SqliteTextTable::open(&path).unwrap();
        assert_eq!(table.list(CHARA_NAME_CATEGORY).unwrap().len(), 1);
    }

    #[test]
    fn sqlite_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteTextTable::open(&dir.path().join("nope.mdb"));
        assert!(matches!(err, Err(TextTableError::Open { .. })));
    }

    #[test]
    fn memory_table_matches_sqlite_semantics() {
        let mut table = MemoryTextTable::new();
        table.insert(181, 2, "b-event").insert(181, 1, "a-event").insert(170, 1, "event");
        let hits = table.find_containing(181, "event").unwrap();
        assert_eq!(hits.iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(table.find_exact(181, "a-event").unwrap().len(), 1);
    }
}
