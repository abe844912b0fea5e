use crate::error::ArchiveError;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub flow_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub source_index: String,
    pub target_index: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairSummary {
    pub source_index: String,
    pub target_index: String,
    pub flows: u64,
}

/// Durable record of flows already handed to the archive, keyed by
/// `(flow_id, source_index, target_index)`.
///
/// Writes run in autocommit mode, so every successful insert is on disk
/// before the call returns.
pub struct Ledger {
    conn: Connection,
    path: PathBuf,
}

impl Ledger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| ArchiveError::io(parent, err))?;
        }
        tracing::info!(path = %path.display(), "opening flow ledger");
        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let ledger = Self { conn, path };
        ledger.initialize()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn initialize(&self) -> Result<(), ArchiveError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS saved_flows (
                flow_id TEXT NOT NULL,
                "start" TEXT,
                "end" TEXT,
                src_idx TEXT NOT NULL,
                dst_idx TEXT NOT NULL,
                PRIMARY KEY (flow_id, src_idx, dst_idx)
            );
            "#,
        )?;
        Ok(())
    }

    pub fn contains(
        &self,
        flow_id: &str,
        source_index: &str,
        target_index: &str,
    ) -> Result<bool, ArchiveError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM saved_flows WHERE flow_id = ?1 AND src_idx = ?2 AND dst_idx = ?3",
                params![flow_id, source_index, target_index],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert one entry; a row already present for the same key is an error.
    pub fn record(&self, entry: &LedgerEntry) -> Result<(), ArchiveError> {
        let inserted = self.conn.execute(
            r#"INSERT INTO saved_flows (flow_id, "start", "end", src_idx, dst_idx)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                entry.flow_id,
                entry.start,
                entry.end,
                entry.source_index,
                entry.target_index
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(ArchiveError::DuplicateEntry {
                    flow_id: entry.flow_id.clone(),
                    source_index: entry.source_index.clone(),
                    target_index: entry.target_index.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Insert the entry unless its key is already present. Returns `true`
    /// when this call created the row.
    pub fn record_if_absent(&self, entry: &LedgerEntry) -> Result<bool, ArchiveError> {
        let changed = self.conn.execute(
            r#"INSERT OR IGNORE INTO saved_flows (flow_id, "start", "end", src_idx, dst_idx)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                entry.flow_id,
                entry.start,
                entry.end,
                entry.source_index,
                entry.target_index
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn count(
        &self,
        source_index: Option<&str>,
        target_index: Option<&str>,
    ) -> Result<u64, ArchiveError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM saved_flows
             WHERE (?1 IS NULL OR src_idx = ?1) AND (?2 IS NULL OR dst_idx = ?2)",
            params![source_index, target_index],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Most recently recorded entries, returned oldest first.
    pub fn entries(
        &self,
        source_index: Option<&str>,
        target_index: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ArchiveError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r#"SELECT flow_id, "start", "end", src_idx, dst_idx FROM (
                   SELECT rowid, flow_id, "start", "end", src_idx, dst_idx
                   FROM saved_flows
                   WHERE (?1 IS NULL OR src_idx = ?1) AND (?2 IS NULL OR dst_idx = ?2)
                   ORDER BY rowid DESC
                   LIMIT ?3
               ) ORDER BY rowid ASC"#,
        )?;
        let rows = stmt.query_map(params![source_index, target_index, limit], |row| {
            Ok(LedgerEntry {
                flow_id: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
                source_index: row.get(3)?,
                target_index: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn pairs(&self) -> Result<Vec<PairSummary>, ArchiveError> {
        let mut stmt = self.conn.prepare(
            "SELECT src_idx, dst_idx, COUNT(*) FROM saved_flows
             GROUP BY src_idx, dst_idx
             ORDER BY src_idx, dst_idx",
        )?;
        let rows = stmt.query_map([], |row| {
            let flows: i64 = row.get(2)?;
            Ok(PairSummary {
                source_index: row.get(0)?,
                target_index: row.get(1)?,
                flows: u64::try_from(flows).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, src: &str, dst: &str) -> LedgerEntry {
        LedgerEntry {
            flow_id: id.to_string(),
            start: Some("1".to_string()),
            end: Some("2".to_string()),
            source_index: src.to_string(),
            target_index: dst.to_string(),
        }
    }

    #[test]
    fn open_creates_parent_dirs_and_is_idempotent() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("nested/dir/ptnad.db");
        let ledger = Ledger::open(&path).expect("open");
        ledger.initialize().expect("second initialize");
        assert!(path.exists());
        assert_eq!(ledger.path(), path.as_path());
    }

    #[test]
    fn record_then_contains() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        assert!(!ledger.contains("f1", "2", "3").expect("contains"));
        ledger.record(&entry("f1", "2", "3")).expect("record");
        assert!(ledger.contains("f1", "2", "3").expect("contains"));
    }

    #[test]
    fn record_rejects_duplicate_key() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        ledger.record(&entry("f1", "2", "3")).expect("record");
        let err = ledger.record(&entry("f1", "2", "3")).expect_err("duplicate");
        assert!(matches!(err, ArchiveError::DuplicateEntry { ref flow_id, .. } if flow_id == "f1"));
        assert_eq!(ledger.count(None, None).expect("count"), 1);
    }

    #[test]
    fn same_flow_may_appear_once_per_pair() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        ledger.record(&entry("f1", "A", "B")).expect("A->B");
        ledger.record(&entry("f1", "A", "C")).expect("A->C");
        assert!(!ledger.contains("f1", "B", "A").expect("contains"));
        assert_eq!(ledger.count(Some("A"), None).expect("count"), 2);
        assert_eq!(ledger.count(Some("A"), Some("C")).expect("count"), 1);
    }

    #[test]
    fn record_if_absent_reports_insertion() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        assert!(ledger.record_if_absent(&entry("f1", "2", "3")).expect("first"));
        assert!(!ledger.record_if_absent(&entry("f1", "2", "3")).expect("second"));
        assert_eq!(ledger.count(None, None).expect("count"), 1);
    }

    #[test]
    fn second_handle_on_same_file_loses_the_insert_race() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("ptnad.db");
        let first = Ledger::open(&path).expect("open first");
        let second = Ledger::open(&path).expect("open second");

        assert!(first.record_if_absent(&entry("f1", "2", "3")).expect("first insert"));
        assert!(!second.record_if_absent(&entry("f1", "2", "3")).expect("second insert"));
        assert!(matches!(
            second.record(&entry("f1", "2", "3")),
            Err(ArchiveError::DuplicateEntry { .. })
        ));
        assert!(second.record_if_absent(&entry("f1", "2", "4")).expect("other pair"));

        assert_eq!(first.count(Some("2"), Some("3")).expect("count"), 1);
        assert_eq!(second.count(None, None).expect("count"), 2);
    }

    #[test]
    fn entries_survive_reopen() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("ptnad.db");
        {
            let ledger = Ledger::open(&path).expect("open");
            ledger.record(&entry("f1", "2", "3")).expect("record");
        }
        let reopened = Ledger::open(&path).expect("reopen");
        assert!(reopened.contains("f1", "2", "3").expect("contains"));
    }

    #[test]
    fn entries_returns_latest_in_insertion_order() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        for id in ["f1", "f2", "f3"] {
            ledger.record(&entry(id, "2", "3")).expect("record");
        }
        ledger.record(&entry("g1", "2", "9")).expect("record");

        let got = ledger.entries(Some("2"), Some("3"), 2).expect("entries");
        let ids: Vec<_> = got.iter().map(|e| e.flow_id.as_str()).collect();
        assert_eq!(ids, vec!["f2", "f3"]);
    }

    #[test]
    fn pairs_groups_counts() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::open(tmp.path().join("ptnad.db")).expect("open");
        ledger.record(&entry("f1", "2", "3")).expect("record");
        ledger.record(&entry("f2", "2", "3")).expect("record");
        ledger.record(&entry("f1", "2", "4")).expect("record");

        let pairs = ledger.pairs().expect("pairs");
        assert_eq!(
            pairs,
            vec![
                PairSummary {
                    source_index: "2".to_string(),
                    target_index: "3".to_string(),
                    flows: 2,
                },
                PairSummary {
                    source_index: "2".to_string(),
                    target_index: "4".to_string(),
                    flows: 1,
                },
            ]
        );
    }
}
