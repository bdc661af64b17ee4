//! SQLite-backed persistence for documents, user settings and the reminder ledger.
//! One file, survives restarts, safe for concurrent access from several passes.

use chrono::{DateTime, NaiveDate, Utc};
use datekeeper_core::error::{DateKeeperError, Result};
use datekeeper_core::{
    Channel, Document, DocumentStore, DocumentType, NotificationSettings, ReminderInterval,
    SettingsStore,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::ledger::{Claim, EntryState, LedgerEntry, LedgerKey, ReminderLedger};

/// SQLite store implementing every storage seam the engine needs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Claims older than this may be taken over by another pass.
    claim_lease: chrono::Duration,
}

impl SqliteStore {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DateKeeperError::Store(format!("DB open: {e}")))?;

        // WAL for concurrent readers; a busy timeout so a second process waits
        // instead of failing on a locked database.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| DateKeeperError::Store(format!("DB busy timeout: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            claim_lease: chrono::Duration::seconds(300),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Override how long an uncommitted claim blocks other passes. A zero
    /// lease would let every pass take over every live claim.
    pub fn with_claim_lease(mut self, secs: u64) -> Result<Self> {
        self.claim_lease = i64::try_from(secs)
            .ok()
            .filter(|s| *s > 0)
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| DateKeeperError::Config(format!("invalid claim lease: {secs}s")))?;
        Ok(self)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DateKeeperError::Store(format!("Lock: {e}")))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                doc_type TEXT NOT NULL DEFAULT 'other',
                expiry_date TEXT NOT NULL,          -- YYYY-MM-DD
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);
            CREATE INDEX IF NOT EXISTS idx_documents_expiry ON documents(expiry_date);

            -- One row per user, replaced wholesale on save
            CREATE TABLE IF NOT EXISTS user_settings (
                owner_id TEXT PRIMARY KEY,
                email TEXT,
                phone TEXT,
                alternate_email TEXT,
                notify_email INTEGER NOT NULL DEFAULT 1,
                notify_sms INTEGER NOT NULL DEFAULT 0,
                enabled_intervals TEXT NOT NULL DEFAULT '[]',   -- JSON array of interval ids
                updated_at TEXT NOT NULL
            );

            -- At most one row per (document, interval)
            CREATE TABLE IF NOT EXISTS reminder_ledger (
                document_id TEXT NOT NULL,
                interval_id TEXT NOT NULL,
                state TEXT NOT NULL,                 -- 'claimed', 'sent'
                claim_token TEXT,
                claimed_at INTEGER,                  -- epoch millis
                expiry_date TEXT,
                channels TEXT NOT NULL DEFAULT '[]', -- JSON array
                sent_at TEXT,
                PRIMARY KEY (document_id, interval_id)
            );
            ",
        )
        .map_err(|e| DateKeeperError::Store(format!("Migration: {e}")))?;
        Ok(())
    }
}

// ─── Documents ──────────────────────────────────────────

struct DocumentRow {
    id: String,
    owner_id: String,
    name: String,
    doc_type: String,
    expiry_date: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            doc_type: row.get(3)?,
            expiry_date: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_document(self) -> Option<Document> {
        let expiry_date = match NaiveDate::parse_from_str(&self.expiry_date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("⚠️ Skipping document {} with malformed expiry date: {e}", self.id);
                return None;
            }
        };
        Some(Document {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            doc_type: DocumentType::parse(&self.doc_type),
            expiry_date,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, owner_id, name, doc_type, expiry_date, created_at, updated_at";

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn write_document(conn: &Connection, doc: &Document) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE documents SET name = ?1, doc_type = ?2, expiry_date = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            doc.name,
            doc.doc_type.as_str(),
            format_date(doc.expiry_date),
            doc.updated_at.to_rfc3339(),
            doc.id,
        ],
    )
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl DocumentStore for SqliteStore {
    fn list_documents(&self, owner_id: Option<&str>) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let rows: Vec<DocumentRow> = match owner_id {
            Some(owner) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ?1 ORDER BY expiry_date, created_at"
                    ))
                    .map_err(|e| DateKeeperError::Store(format!("List documents: {e}")))?;
                stmt.query_map([owner], DocumentRow::from_row)
                    .and_then(|rows| rows.collect())
                    .map_err(|e| DateKeeperError::Store(format!("List documents: {e}")))?
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY expiry_date, created_at"
                    ))
                    .map_err(|e| DateKeeperError::Store(format!("List documents: {e}")))?;
                stmt.query_map([], DocumentRow::from_row)
                    .and_then(|rows| rows.collect())
                    .map_err(|e| DateKeeperError::Store(format!("List documents: {e}")))?
            }
        };
        Ok(rows.into_iter().filter_map(DocumentRow::into_document).collect())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                [id],
                DocumentRow::from_row,
            )
            .optional()
            .map_err(|e| DateKeeperError::Store(format!("Get document: {e}")))?;
        Ok(row.and_then(DocumentRow::into_document))
    }

    fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (id, owner_id, name, doc_type, expiry_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                doc.id,
                doc.owner_id,
                doc.name,
                doc.doc_type.as_str(),
                format_date(doc.expiry_date),
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DateKeeperError::Store(format!("Insert document: {e}")))?;
        Ok(())
    }

    fn update_document(&self, doc: &Document) -> Result<bool> {
        let conn = self.lock()?;
        let changed = write_document(&conn, doc)
            .map_err(|e| DateKeeperError::Store(format!("Update document: {e}")))?;
        Ok(changed > 0)
    }

    fn delete_document(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM documents WHERE id = ?1", [id])
            .map_err(|e| DateKeeperError::Store(format!("Delete document: {e}")))?;
        Ok(changed > 0)
    }
}

// ─── Settings ──────────────────────────────────────────

impl SettingsStore for SqliteStore {
    fn get_settings(&self, owner_id: &str) -> Result<NotificationSettings> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT email, phone, alternate_email, notify_email, notify_sms, enabled_intervals
                 FROM user_settings WHERE owner_id = ?1",
                [owner_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i32>(3)? != 0,
                        row.get::<_, i32>(4)? != 0,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DateKeeperError::Store(format!("Get settings: {e}")))?;

        let Some((email, phone, alternate_email, notify_email, notify_sms, intervals_json)) = row else {
            return Ok(NotificationSettings::defaults_for(owner_id));
        };

        let ids: Vec<String> = serde_json::from_str(&intervals_json).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Malformed interval list for {owner_id}: {e}");
            Vec::new()
        });
        let enabled_intervals: BTreeSet<ReminderInterval> = ids
            .iter()
            .filter_map(|id| match ReminderInterval::from_id(id) {
                Ok(interval) => Some(interval),
                Err(e) => {
                    tracing::warn!("⚠️ Ignoring stored interval for {owner_id}: {e}");
                    None
                }
            })
            .collect();

        Ok(NotificationSettings {
            owner_id: owner_id.to_string(),
            email,
            phone,
            alternate_email,
            notify_email,
            notify_sms,
            enabled_intervals,
        })
    }

    fn put_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let ids: Vec<&str> = settings.enabled_intervals.iter().map(|i| i.id()).collect();
        let intervals_json = serde_json::to_string(&ids)
            .map_err(|e| DateKeeperError::Store(format!("Encode intervals: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_settings
             (owner_id, email, phone, alternate_email, notify_email, notify_sms, enabled_intervals, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                settings.owner_id,
                settings.email,
                settings.phone,
                settings.alternate_email,
                settings.notify_email as i32,
                settings.notify_sms as i32,
                intervals_json,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| DateKeeperError::Store(format!("Save settings: {e}")))?;
        Ok(())
    }
}

// ─── Reminder Ledger ──────────────────────────────────────

fn encode_channels(channels: &[Channel]) -> String {
    let names: Vec<&str> = channels.iter().map(|c| c.as_str()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".into())
}

fn decode_channels(json: &str) -> Vec<Channel> {
    serde_json::from_str::<Vec<String>>(json)
        .unwrap_or_default()
        .iter()
        .filter_map(|s| Channel::parse(s))
        .collect()
}

fn ledger_err(op: &str, e: rusqlite::Error) -> DateKeeperError {
    DateKeeperError::Ledger(format!("{op}: {e}"))
}

impl ReminderLedger for SqliteStore {
    fn has_sent(&self, key: &LedgerKey) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reminder_ledger
                 WHERE document_id = ?1 AND interval_id = ?2 AND state = 'sent'",
                params![key.document_id, key.interval.id()],
                |r| r.get(0),
            )
            .map_err(|e| ledger_err("Has sent", e))?;
        Ok(count > 0)
    }

    fn record_sent(&self, key: &LedgerKey, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT INTO reminder_ledger (document_id, interval_id, state, channels, sent_at)
                 VALUES (?1, ?2, 'sent', ?3, ?4)
                 ON CONFLICT(document_id, interval_id) DO NOTHING",
                params![
                    key.document_id,
                    key.interval.id(),
                    encode_channels(channels),
                    sent_at.to_rfc3339(),
                ],
            )
            .map_err(|e| ledger_err("Record sent", e))?;
        Ok(inserted == 1)
    }

    fn try_claim(&self, key: &LedgerKey, expiry_date: NaiveDate, now: DateTime<Utc>) -> Result<Option<Claim>> {
        let token = uuid::Uuid::new_v4().to_string();
        let now_ms = now.timestamp_millis();
        let stale_before = (now - self.claim_lease).timestamp_millis();

        // Insert-if-absent; an existing row is only taken over when it is an
        // abandoned claim past its lease. Sent rows are never touched.
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "INSERT INTO reminder_ledger
                     (document_id, interval_id, state, claim_token, claimed_at, expiry_date)
                 VALUES (?1, ?2, 'claimed', ?3, ?4, ?5)
                 ON CONFLICT(document_id, interval_id) DO UPDATE SET
                     claim_token = excluded.claim_token,
                     claimed_at = excluded.claimed_at,
                     expiry_date = excluded.expiry_date
                 WHERE reminder_ledger.state = 'claimed' AND reminder_ledger.claimed_at < ?6",
                params![
                    key.document_id,
                    key.interval.id(),
                    token,
                    now_ms,
                    format_date(expiry_date),
                    stale_before,
                ],
            )
            .map_err(|e| ledger_err("Claim", e))?;

        if changed == 1 {
            Ok(Some(Claim { key: key.clone(), token }))
        } else {
            Ok(None)
        }
    }

    fn commit(&self, claim: &Claim, channels: &[Channel], sent_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE reminder_ledger
                 SET state = 'sent', channels = ?1, sent_at = ?2, claim_token = NULL
                 WHERE document_id = ?3 AND interval_id = ?4 AND state = 'claimed' AND claim_token = ?5",
                params![
                    encode_channels(channels),
                    sent_at.to_rfc3339(),
                    claim.key.document_id,
                    claim.key.interval.id(),
                    claim.token,
                ],
            )
            .map_err(|e| ledger_err("Commit", e))?;
        Ok(changed == 1)
    }

    fn release(&self, claim: &Claim) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM reminder_ledger
             WHERE document_id = ?1 AND interval_id = ?2 AND state = 'claimed' AND claim_token = ?3",
            params![claim.key.document_id, claim.key.interval.id(), claim.token],
        )
        .map_err(|e| ledger_err("Release", e))?;
        Ok(())
    }

    fn invalidate(&self, document_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM reminder_ledger WHERE document_id = ?1", [document_id])
            .map_err(|e| ledger_err("Invalidate", e))?;
        if removed > 0 {
            tracing::debug!("🧹 Cleared {removed} ledger entries for document {document_id}");
        }
        Ok(removed)
    }

    fn reschedule(&self, document: &Document) -> Result<Option<usize>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| ledger_err("Reschedule", e))?;
        if write_document(&tx, document).map_err(|e| ledger_err("Reschedule", e))? == 0 {
            return Ok(None);
        }
        let removed = tx
            .execute("DELETE FROM reminder_ledger WHERE document_id = ?1", [&document.id])
            .map_err(|e| ledger_err("Reschedule", e))?;
        tx.commit().map_err(|e| ledger_err("Reschedule", e))?;
        Ok(Some(removed))
    }

    fn entries(&self, document_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT interval_id, state, channels, expiry_date, sent_at
                 FROM reminder_ledger WHERE document_id = ?1",
            )
            .map_err(|e| ledger_err("Entries", e))?;
        let rows: Vec<(String, String, String, Option<String>, Option<String>)> = stmt
            .query_map([document_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })
            .and_then(|rows| rows.collect())
            .map_err(|e| ledger_err("Entries", e))?;

        let mut entries: Vec<LedgerEntry> = rows
            .into_iter()
            .filter_map(|(interval_id, state, channels, expiry, sent_at)| {
                let interval = ReminderInterval::from_id(&interval_id).ok()?;
                Some(LedgerEntry {
                    document_id: document_id.to_string(),
                    interval,
                    state: if state == "sent" { EntryState::Sent } else { EntryState::Claimed },
                    channels: decode_channels(&channels),
                    expiry_date: expiry.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                    sent_at: sent_at.map(|s| parse_timestamp(&s)),
                })
            })
            .collect();
        entries.sort_by_key(|e| e.interval);
        Ok(entries)
    }
}
