//! SQLite store for status samples and remediation events.
//!
//! Opened in WAL mode so the monitoring run (single writer) never blocks the
//! dashboard's concurrent readers, and long reads never starve the writer.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS status_samples (
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL,
    success_percentage INTEGER NOT NULL,
    avg_latency_ms REAL,
    max_latency_ms REAL,
    min_latency_ms REAL,
    packet_loss INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_status_samples_time ON status_samples (timestamp);

CREATE TABLE IF NOT EXISTS remediation_events (
    timestamp TEXT NOT NULL,
    reason TEXT NOT NULL,
    trigger_kind TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_remediation_events_time ON remediation_events (timestamp);
";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        // WAL: one writer, many concurrent readers. journal_mode returns a
        // row, so it goes through query_row rather than execute.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| DbError::Migration(format!("schema init failed: {}", e)))?;

        Ok(())
    }

    // --- Status samples ---

    /// Append one sample.
    pub fn add_sample(&self, sample: &StatusSample) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO status_samples
             (timestamp, status, success_percentage, avg_latency_ms, max_latency_ms, min_latency_ms, packet_loss)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sample.timestamp.format(DB_TIME_FORMAT).to_string(),
                sample.status.label(),
                sample.success_percentage,
                sample.avg_latency_ms,
                sample.max_latency_ms,
                sample.min_latency_ms,
                sample.packet_loss_percentage,
            ],
        )?;
        Ok(())
    }

    /// Get samples at or after `start`, ordered by timestamp.
    pub fn samples_since(&self, start: DateTime<Utc>) -> Result<Vec<StatusSample>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, status, success_percentage, avg_latency_ms, max_latency_ms, min_latency_ms, packet_loss
             FROM status_samples WHERE timestamp >= ?1 ORDER BY timestamp ASC",
        )?;

        let samples = stmt
            .query_map(params![start.format(DB_TIME_FORMAT).to_string()], |row| {
                let time_str: String = row.get(0)?;
                let status_str: String = row.get(1)?;
                Ok(StatusSample {
                    timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                    status: Status::parse(&status_str).unwrap_or(Status::Down),
                    success_percentage: row.get(2)?,
                    avg_latency_ms: row.get(3)?,
                    max_latency_ms: row.get(4)?,
                    min_latency_ms: row.get(5)?,
                    packet_loss_percentage: row.get(6)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(samples)
    }

    /// Get all samples, ordered by timestamp.
    pub fn all_samples(&self) -> Result<Vec<StatusSample>, DbError> {
        self.samples_since(DateTime::<Utc>::MIN_UTC)
    }

    // --- Remediation events ---

    /// Append one remediation event.
    pub fn add_event(&self, event: &RemediationEvent) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO remediation_events (timestamp, reason, trigger_kind) VALUES (?1, ?2, ?3)",
            params![
                event.timestamp.format(DB_TIME_FORMAT).to_string(),
                event.reason,
                event.trigger_kind.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Get events at or after `start`, ordered by timestamp.
    pub fn events_since(&self, start: DateTime<Utc>) -> Result<Vec<RemediationEvent>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, reason, trigger_kind FROM remediation_events
             WHERE timestamp >= ?1 ORDER BY timestamp ASC",
        )?;

        let events = stmt
            .query_map(params![start.format(DB_TIME_FORMAT).to_string()], |row| {
                let time_str: String = row.get(0)?;
                let kind_str: String = row.get(2)?;
                Ok(RemediationEvent {
                    timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
                    reason: row.get(1)?,
                    trigger_kind: TriggerKind::parse(&kind_str).unwrap_or(TriggerKind::Automatic),
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(events)
    }

    /// Get all events, ordered by timestamp.
    pub fn all_events(&self) -> Result<Vec<RemediationEvent>, DbError> {
        self.events_since(DateTime::<Utc>::MIN_UTC)
    }

    // --- Retention ---

    /// Delete samples and events older than `cutoff`, compared by each row's
    /// own timestamp field. Rows are parsed individually so mixed timestamp
    /// encodings (space-separated, RFC 3339, second precision) age out
    /// correctly rather than relying on lexical ordering. Returns the number
    /// of rows removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let mut removed = 0;
        removed += self.prune_table("status_samples", cutoff)?;
        removed += self.prune_table("remediation_events", cutoff)?;
        Ok(removed)
    }

    fn prune_table(&self, table: &str, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.conn.lock().unwrap();

        let expired: Vec<i64> = {
            let mut stmt = conn.prepare(&format!("SELECT rowid, timestamp FROM {}", table))?;
            let rows = stmt.query_map([], |row| {
                let rowid: i64 = row.get(0)?;
                let ts: String = row.get(1)?;
                Ok((rowid, ts))
            })?;

            let mut expired = Vec::new();
            for row in rows {
                let (rowid, ts) = row?;
                match parse_db_time(&ts) {
                    Some(t) if t < cutoff => expired.push(rowid),
                    Some(_) => {}
                    None => {
                        tracing::warn!("Unparseable timestamp in {}: {:?}", table, ts);
                    }
                }
            }
            expired
        };

        if expired.is_empty() {
            return Ok(0);
        }

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE rowid = ?1", table))?;
            for rowid in &expired {
                stmt.execute(params![rowid])?;
            }
        }
        tx.commit()?;

        Ok(expired.len())
    }

    // --- Compaction ---

    /// Full maintenance pass: checkpoint the WAL and reclaim space freed by
    /// retention deletes.
    pub fn compact(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }

    /// Database size in bytes, for the status surface.
    pub fn size_bytes(&self) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        Ok(page_count * page_size)
    }
}

/// Parse a datetime string from the database, tolerating the encodings other
/// tooling has historically written.
pub fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::NamedTempFile;

    fn sample_at(ts: DateTime<Utc>, success: u8) -> StatusSample {
        let has_success = success > 0;
        StatusSample {
            timestamp: ts,
            status: match success {
                100 => Status::Up,
                0 => Status::Down,
                _ => Status::Partial,
            },
            success_percentage: success,
            avg_latency_ms: has_success.then_some(12.5),
            max_latency_ms: has_success.then_some(30.0),
            min_latency_ms: has_success.then_some(8.0),
            packet_loss_percentage: 100 - success,
        }
    }

    #[test]
    fn test_sample_roundtrip() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        store.add_sample(&sample_at(ts, 53)).unwrap();

        let samples = store.all_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].success_percentage, 53);
        assert_eq!(samples[0].packet_loss_percentage, 47);
        assert_eq!(samples[0].status, Status::Partial);
        assert_eq!(samples[0].timestamp, ts);
        assert!(samples[0].avg_latency_ms.is_some());
    }

    #[test]
    fn test_down_sample_has_no_latency() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        store.add_sample(&sample_at(ts, 0)).unwrap();

        let samples = store.all_samples().unwrap();
        assert_eq!(samples[0].avg_latency_ms, None);
        assert_eq!(samples[0].max_latency_ms, None);
        assert_eq!(samples[0].min_latency_ms, None);
    }

    #[test]
    fn test_samples_since_filters_by_time() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let early = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        store.add_sample(&sample_at(early, 100)).unwrap();
        store.add_sample(&sample_at(late, 100)).unwrap();

        let cut = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let samples = store.samples_since(cut).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, late);
    }

    #[test]
    fn test_event_roundtrip() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        store
            .add_event(&RemediationEvent {
                timestamp: ts,
                reason: "manual override".to_string(),
                trigger_kind: TriggerKind::Manual,
            })
            .unwrap();

        let events = store.all_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger_kind, TriggerKind::Manual);
        assert_eq!(events[0].reason, "manual override");
    }

    #[test]
    fn test_prune_removes_only_expired_rows() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let old = now - ChronoDuration::days(20);
        let recent = now - ChronoDuration::days(1);

        store.add_sample(&sample_at(old, 100)).unwrap();
        store.add_sample(&sample_at(recent, 100)).unwrap();
        store
            .add_event(&RemediationEvent {
                timestamp: old,
                reason: "auto: 5 consecutive failures".to_string(),
                trigger_kind: TriggerKind::Automatic,
            })
            .unwrap();

        let removed = store
            .prune_older_than(now - ChronoDuration::days(14))
            .unwrap();
        assert_eq!(removed, 2);

        let samples = store.all_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, recent);
        assert!(store.all_events().unwrap().is_empty());
    }

    #[test]
    fn test_prune_tolerates_mixed_timestamp_encodings() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        // Rows written by older tooling used RFC 3339 with a Z suffix.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO status_samples
                 (timestamp, status, success_percentage, packet_loss)
                 VALUES ('2024-01-01T00:00:00Z', 'Up', 100, 0)",
                [],
            )
            .unwrap();
        }
        let recent = Utc.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).unwrap();
        store.add_sample(&sample_at(recent, 100)).unwrap();

        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let removed = store.prune_older_than(cutoff).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.all_samples().unwrap().len(), 1);
    }

    #[test]
    fn test_compact_succeeds() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        for i in 0..50 {
            store
                .add_sample(&sample_at(ts + ChronoDuration::minutes(i), 100))
                .unwrap();
        }
        store.prune_older_than(ts + ChronoDuration::minutes(25)).unwrap();
        store.compact().unwrap();
        assert!(store.size_bytes().unwrap() > 0);
    }

    #[test]
    fn test_parse_db_time_formats() {
        assert!(parse_db_time("2024-06-01 12:00:00.123456").is_some());
        assert!(parse_db_time("2024-06-01 12:00:00").is_some());
        assert!(parse_db_time("2024-06-01T12:00:00Z").is_some());
        assert!(parse_db_time("2024-06-01T12:00:00+00:00").is_some());
        assert!(parse_db_time("not a time").is_none());
    }
}
