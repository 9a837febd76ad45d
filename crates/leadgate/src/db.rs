//! SQLite persistence for leads and SMS codes.
//!
//! One database file holds both tables. rusqlite is synchronous, so every
//! call runs on the blocking pool behind a mutex-guarded connection.
//!
//! # Schema Versioning
//!
//! `schema_version` holds a single row. To change the schema, bump
//! `CURRENT_SCHEMA_VERSION` and add a step to `run_migrations()`.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

use leadgate_common::{LeadMeta, LeadRecord, NewLead, OtpEntry};

use crate::leads::LeadStore;
use crate::otp::OtpStore;

const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed lead and code storage
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and run pending migrations.
    /// `:memory:` gives a private in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let is_in_memory = path_ref.as_os_str() == ":memory:";

        if !is_in_memory {
            if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path_ref)
            .with_context(|| format!("Failed to open database {}", path_ref.display()))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("Failed to set journal_mode")?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            tracing::warn!(journal_mode = %journal_mode, "SQLite did not enable WAL mode");
        }

        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous mode")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))
            .context("Failed to set busy timeout")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .context("Failed to configure database")?;

        let current_version: i64 = conn
            .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .context("Failed to read schema version")?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<()> {
        if from_version > CURRENT_SCHEMA_VERSION {
            bail!(
                "Database schema version {from_version} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            );
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS requests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT,
                    phone TEXT NOT NULL,
                    sum INTEGER,
                    created_at TEXT NOT NULL,
                    meta TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sms_codes (
                    phone TEXT PRIMARY KEY,
                    code TEXT NOT NULL,
                    attempts INTEGER NOT NULL DEFAULT 0,
                    expires_at INTEGER NOT NULL,
                    created_at INTEGER NOT NULL
                );
                "#,
            )
            .context("Migration v1 failed")?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .context("Failed to update schema version")?;

        tracing::info!(
            from = from_version,
            to = CURRENT_SCHEMA_VERSION,
            "Database schema migrated"
        );
        Ok(())
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow!("database connection lock poisoned"))?;
            f(&*conn).with_context(|| format!("SQLite {op} failed"))
        })
        .await
        .with_context(|| format!("SQLite {op} task panicked"))?
    }

    async fn ping_db(&self) -> Result<()> {
        self.with_conn("ping", |conn| {
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
    }
}

/// Raw `requests` row before timestamp/meta decoding
type LeadRow = (i64, Option<String>, String, Option<i64>, String, String);

fn decode_lead(row: LeadRow) -> Result<LeadRecord> {
    let (id, name, phone, sum, created_at, meta) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("Corrupt created_at on lead {id}"))?
        .with_timezone(&Utc);
    let meta: LeadMeta =
        serde_json::from_str(&meta).with_context(|| format!("Corrupt meta on lead {id}"))?;

    Ok(LeadRecord {
        id,
        name,
        phone,
        sum,
        created_at,
        meta,
    })
}

#[async_trait]
impl LeadStore for Database {
    async fn create(&self, lead: NewLead) -> Result<i64> {
        let meta = serde_json::to_string(&lead.meta)?;
        let created_at = Utc::now().to_rfc3339();

        self.with_conn("insert lead", move |conn| {
            conn.execute(
                "INSERT INTO requests (name, phone, sum, created_at, meta)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![lead.name, lead.phone.as_str(), lead.sum, created_at, meta],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn list(&self, limit: usize) -> Result<Vec<LeadRecord>> {
        let rows: Vec<LeadRow> = self
            .with_conn("list leads", move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, phone, sum, created_at, meta
                     FROM requests ORDER BY id DESC LIMIT ?1",
                )?;
                let rows: Vec<LeadRow> = stmt
                    .query_map(params![limit as i64], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(decode_lead).collect()
    }

    async fn ping(&self) -> Result<()> {
        self.ping_db().await
    }
}

#[async_trait]
impl OtpStore for Database {
    async fn replace(&self, entry: &OtpEntry) -> Result<()> {
        let phone = entry.phone.clone();
        let code = entry.code.clone();
        let expires_ms = entry.expires_at.timestamp_millis();
        let created_ms = Utc::now().timestamp_millis();

        self.with_conn("replace code", move |conn| {
            conn.execute(
                "INSERT INTO sms_codes (phone, code, attempts, expires_at, created_at)
                 VALUES (?1, ?2, 0, ?3, ?4)
                 ON CONFLICT(phone) DO UPDATE SET
                     code = excluded.code,
                     attempts = 0,
                     expires_at = excluded.expires_at,
                     created_at = excluded.created_at",
                params![phone, code, expires_ms, created_ms],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, phone: &str) -> Result<Option<OtpEntry>> {
        let phone = phone.to_string();
        self.with_conn("read code", move |conn| {
            let row: Option<(String, u32, i64)> = conn
                .query_row(
                    "SELECT code, attempts, expires_at FROM sms_codes WHERE phone = ?1",
                    params![phone],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            row.map(|(code, attempts, expires_ms)| -> Result<OtpEntry> {
                let expires_at = DateTime::<Utc>::from_timestamp_millis(expires_ms)
                    .ok_or_else(|| anyhow!("code expiry out of range: {expires_ms}"))?;
                Ok(OtpEntry {
                    phone,
                    code,
                    attempts,
                    expires_at,
                })
            })
            .transpose()
        })
        .await
    }

    async fn increment_attempts(&self, phone: &str) -> Result<()> {
        let phone = phone.to_string();
        self.with_conn("record attempt", move |conn| {
            conn.execute(
                "UPDATE sms_codes SET attempts = attempts + 1 WHERE phone = ?1",
                params![phone],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, phone: &str) -> Result<bool> {
        let phone = phone.to_string();
        self.with_conn("delete code", move |conn| {
            let removed = conn.execute("DELETE FROM sms_codes WHERE phone = ?1", params![phone])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.ping_db().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use leadgate_common::{Phone, VerificationMethod};
    use serde_json::json;

    fn lead(name: &str, meta: LeadMeta) -> NewLead {
        NewLead {
            name: Some(name.to_string()),
            phone: Phone::parse("9991234567").unwrap(),
            sum: Some(150000),
            meta,
        }
    }

    #[tokio::test]
    async fn test_leads_roundtrip_newest_first() {
        let db = Database::open(":memory:").unwrap();

        let first = LeadStore::create(&db, lead("Anna", LeadMeta::direct(None, Some(json!({"a": 1})))))
            .await
            .unwrap();
        let second = LeadStore::create(&db, lead("Boris", LeadMeta::otp_verified(None)))
            .await
            .unwrap();
        assert!(second > first);

        let items = LeadStore::list(&db, 100).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, second);
        assert_eq!(items[0].name.as_deref(), Some("Boris"));
        assert_eq!(items[0].meta.via, Some(VerificationMethod::Otp));
        assert_eq!(items[1].meta.extra, Some(json!({"a": 1})));
        assert_eq!(items[1].sum, Some(150000));

        assert_eq!(LeadStore::list(&db, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_code_replace_keeps_one_row_per_phone() {
        let db = Database::open(":memory:").unwrap();
        let phone = Phone::parse("9991234567").unwrap();

        db.replace(&OtpEntry::new(&phone, "1111".into(), Duration::minutes(5)))
            .await
            .unwrap();
        db.increment_attempts(phone.as_str()).await.unwrap();
        db.replace(&OtpEntry::new(&phone, "2222".into(), Duration::minutes(5)))
            .await
            .unwrap();

        let entry = OtpStore::get(&db, phone.as_str()).await.unwrap().unwrap();
        assert_eq!(entry.code, "2222");
        assert_eq!(entry.attempts, 0);

        let rows: i64 = db
            .with_conn("count", |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM sms_codes", [], |r| r.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_code_attempts_and_removal() {
        let db = Database::open(":memory:").unwrap();
        let phone = Phone::parse("9991234567").unwrap();
        let entry = OtpEntry::new(&phone, "4821".into(), Duration::minutes(5));
        db.replace(&entry).await.unwrap();

        for _ in 0..3 {
            db.increment_attempts(phone.as_str()).await.unwrap();
        }
        let stored = OtpStore::get(&db, phone.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 3);
        assert_eq!(
            stored.expires_at.timestamp_millis(),
            entry.expires_at.timestamp_millis()
        );

        assert!(OtpStore::remove(&db, phone.as_str()).await.unwrap());
        assert!(!OtpStore::remove(&db, phone.as_str()).await.unwrap());
        db.increment_attempts(phone.as_str()).await.unwrap();
        assert!(OtpStore::get(&db, phone.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("leads.sqlite");

        let db = Database::open(&path).unwrap();
        let id = LeadStore::create(&db, lead("Anna", LeadMeta::direct(None, None)))
            .await
            .unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        let items = LeadStore::list(&db, 10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        LeadStore::ping(&db).await.unwrap();
    }
}
