//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::crawler::CrawlTarget;
use crate::record::{Field, StatRecord, StatValue};
use crate::state::TargetStage;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::{FailureRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

/// Largest valid zip code key
const MAX_ZIP: i64 = 99_999;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    /// Statistics actually written; every other column is stored as NULL
    persisted: Vec<Field>,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let mut store = Self {
            conn,
            persisted: Field::ALL.to_vec(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Restricts which statistics are written
    pub fn with_persisted_fields(mut self, fields: Vec<Field>) -> Self {
        self.persisted = fields;
        self
    }

    /// The statistics this store writes
    pub fn persisted_fields(&self) -> &[Field] {
        &self.persisted
    }

    fn column_list() -> String {
        Field::ALL
            .iter()
            .map(|f| f.name())
            .chain(["zip_code", "city", "state"])
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StatRecord> {
        let zip_index = Field::ALL.len();
        let mut record = StatRecord::new(
            row.get(zip_index)?,
            &row.get::<_, Option<String>>(zip_index + 1)?.unwrap_or_default(),
            &row.get::<_, Option<String>>(zip_index + 2)?.unwrap_or_default(),
        );

        for (i, field) in Field::ALL.iter().enumerate() {
            let value = if field.kind().is_integer() {
                row.get::<_, Option<i64>>(i)?.map(StatValue::Integer)
            } else {
                row.get::<_, Option<f64>>(i)?.map(StatValue::Float)
            };
            record.set(*field, value);
        }

        Ok(record)
    }

    fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RunStatus::Running),
            targets_seen: row.get::<_, i64>(5)? as u64,
            records_written: row.get::<_, i64>(6)? as u64,
        })
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        targets_seen: u64,
        records_written: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, targets_seen = ?3, records_written = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                targets_seen as i64,
                records_written as i64,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn check_key(zip_code: i64) -> StorageResult<()> {
    if (0..=MAX_ZIP).contains(&zip_code) {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(zip_code))
    }
}

/// Reads a stored stage name back into a `TargetStage`
fn stage_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<TargetStage> {
    let stage: String = row.get(idx)?;
    TargetStage::from_db_string(&stage).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown stage '{}'", stage).into(),
        )
    })
}

fn to_sql_value(value: Option<StatValue>) -> Value {
    match value {
        Some(StatValue::Integer(i)) => Value::Integer(i),
        Some(StatValue::Float(f)) => Value::Real(f),
        None => Value::Null,
    }
}

impl Store for SqliteStore {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    // ===== Records =====

    fn exists(&self, zip_code: i64) -> StorageResult<bool> {
        check_key(zip_code)?;
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM stats WHERE zip_code = ?1 LIMIT 1",
                params![zip_code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&mut self, record: &StatRecord) -> StorageResult<bool> {
        check_key(record.zip_code)?;

        let mut values: Vec<Value> = Field::ALL
            .iter()
            .map(|field| {
                if self.persisted.contains(field) {
                    to_sql_value(record.get(*field))
                } else {
                    Value::Null
                }
            })
            .collect();
        values.push(Value::Integer(record.zip_code));
        values.push(Value::Text(record.city.clone()));
        values.push(Value::Text(record.state.clone()));

        let zip_param = Field::ALL.len() + 1;
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO stats ({}) SELECT {} WHERE NOT EXISTS (SELECT 1 FROM stats WHERE zip_code = ?{})",
            Self::column_list(),
            placeholders,
            zip_param
        );

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed == 1)
    }

    fn get(&self, zip_code: i64) -> StorageResult<Option<StatRecord>> {
        check_key(zip_code)?;
        let sql = format!(
            "SELECT {} FROM stats WHERE zip_code = ?1 ORDER BY rowid LIMIT 1",
            Self::column_list()
        );
        let record = self
            .conn
            .query_row(&sql, params![zip_code], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn records_by_state(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(state, ''), COUNT(*) FROM stats GROUP BY state ORDER BY state",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        targets_seen: u64,
        records_written: u64,
    ) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Completed, targets_seen, records_written)
    }

    fn fail_run(
        &mut self,
        run_id: i64,
        targets_seen: u64,
        records_written: u64,
    ) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Failed, targets_seen, records_written)
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, targets_seen, records_written
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                Self::row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Failure Markers =====

    fn record_failure(
        &mut self,
        run_id: i64,
        target: &CrawlTarget,
        stage: TargetStage,
        error: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_failures
                 (run_id, zip_code, city, state, detail_url, stage, error, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                target.zip_code,
                target.city,
                target.state,
                target.detail_url.as_str(),
                stage.to_db_string(),
                error,
                now
            ],
        )?;
        Ok(())
    }

    fn count_failures(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM crawl_failures", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn failures(&self) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, zip_code, city, state, detail_url, stage, error, failed_at
             FROM crawl_failures ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(FailureRecord {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    zip_code: row.get(2)?,
                    city: row.get(3)?,
                    state: row.get(4)?,
                    detail_url: row.get(5)?,
                    stage: stage_from_row(row, 6)?,
                    error: row.get(7)?,
                    failed_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
