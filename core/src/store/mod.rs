//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Rollups never see SQL. They take records in and hand rows back.

mod output;
mod source;

pub use source::{BALANCE_TABLE, BUREAU_TABLE, PREVIOUS_APPLICATION_SOURCE};

use crate::{error::FeatureResult, manifest::RunManifest};
use rusqlite::{params, Connection, OptionalExtension};

pub struct FeatureStore {
    conn: Connection,
}

impl FeatureStore {
    /// Open (or create) the feature database at `path`.
    pub fn open(path: &str) -> FeatureResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> FeatureResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> FeatureResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_sources.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_feature_run.sql"))?;
        Ok(())
    }

    /// Run raw SQL. For loaders that manage their own source schema.
    pub fn execute_batch(&self, sql: &str) -> FeatureResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> FeatureResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names of `table`, in declaration order.
    pub fn table_columns(&self, table: &str) -> FeatureResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    // ── Run manifest ───────────────────────────────────────────

    pub fn insert_run_manifest(&self, manifest: &RunManifest, version: &str) -> FeatureResult<()> {
        self.conn.execute(
            "INSERT INTO feature_run (run_id, version, created_at, manifest_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                manifest.run_id,
                version,
                manifest.created_at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
                serde_json::to_string(manifest)?,
            ],
        )?;
        Ok(())
    }

    pub fn run_manifest(&self, run_id: &str) -> FeatureResult<Option<RunManifest>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT manifest_json FROM feature_run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    pub fn latest_manifest(&self) -> FeatureResult<Option<RunManifest>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT manifest_json FROM feature_run
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }
}

/// Quote an SQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
