use crate::engine::record::ExecutionRecord;
use crate::errors::EngineError;
use crate::stores::history::HistoryStore;
use crate::utils::fs_atomic::ensure_dir_for_file;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS execution_records (
    id TEXT PRIMARY KEY,
    template_id TEXT NOT NULL,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    headers TEXT NOT NULL,
    params TEXT NOT NULL,
    body TEXT NOT NULL,
    auth TEXT NOT NULL,
    response_status INTEGER,
    response_headers TEXT,
    response_body TEXT,
    response_time REAL NOT NULL,
    error TEXT,
    executed_at TEXT NOT NULL,
    executed_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_execution_records_template
    ON execution_records (template_id, executed_at);
";

/// Insert-only history backed by a single SQLite connection. Calls run on
/// the blocking pool and serialize through the connection mutex.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteHistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        ensure_dir_for_file(&path).map_err(|err| {
            EngineError::persistence(format!("Failed to create history directory: {}", err))
        })?;
        let conn = Connection::open(&path)?;
        Self::init(conn, Some(path))
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, EngineError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    async fn call<T, F>(&self, op: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, EngineError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| EngineError::persistence("history connection lock poisoned"))?;
            op(&mut guard)
        })
        .await
        .map_err(|err| EngineError::persistence(format!("history task failed: {}", err)))?
    }
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|err| EngineError::persistence(err.to_string()))
}

fn from_json_text<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, EngineError> {
    serde_json::from_str(raw).map_err(|err| EngineError::persistence(err.to_string()))
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawRow {
    id: String,
    template_id: String,
    url: String,
    method: String,
    headers: String,
    params: String,
    body: String,
    auth: String,
    response_status: Option<i64>,
    response_headers: Option<String>,
    response_body: Option<String>,
    response_time: f64,
    error: Option<String>,
    executed_at: String,
    executed_by: Option<String>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            template_id: row.get(1)?,
            url: row.get(2)?,
            method: row.get(3)?,
            headers: row.get(4)?,
            params: row.get(5)?,
            body: row.get(6)?,
            auth: row.get(7)?,
            response_status: row.get(8)?,
            response_headers: row.get(9)?,
            response_body: row.get(10)?,
            response_time: row.get(11)?,
            error: row.get(12)?,
            executed_at: row.get(13)?,
            executed_by: row.get(14)?,
        })
    }

    fn into_record(self) -> Result<ExecutionRecord, EngineError> {
        let parse_id = |raw: &str| {
            Uuid::parse_str(raw).map_err(|err| EngineError::persistence(err.to_string()))
        };
        let executed_at = DateTime::parse_from_rfc3339(&self.executed_at)
            .map_err(|err| EngineError::persistence(err.to_string()))?
            .with_timezone(&Utc);
        let response_status = self
            .response_status
            .map(|status| {
                u16::try_from(status)
                    .map_err(|_| EngineError::persistence(format!("bad status {}", status)))
            })
            .transpose()?;
        Ok(ExecutionRecord {
            id: parse_id(&self.id)?,
            template_id: parse_id(&self.template_id)?,
            url: self.url,
            method: self.method,
            headers: from_json_text(&self.headers)?,
            params: from_json_text(&self.params)?,
            body: from_json_text(&self.body)?,
            auth: from_json_text(&self.auth)?,
            response_status,
            response_headers: self
                .response_headers
                .as_deref()
                .map(from_json_text)
                .transpose()?,
            response_body: self.response_body.as_deref().map(from_json_text).transpose()?,
            response_time: self.response_time,
            error: self.error,
            executed_at,
            executed_by: self.executed_by,
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, record: ExecutionRecord) -> Result<(), EngineError> {
        let headers = to_json_text(&record.headers)?;
        let params_text = to_json_text(&record.params)?;
        let body = to_json_text(&record.body)?;
        let auth = to_json_text(&record.auth)?;
        let response_headers = record.response_headers.as_ref().map(to_json_text).transpose()?;
        let response_body = record.response_body.as_ref().map(to_json_text).transpose()?;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO execution_records (
                    id, template_id, url, method, headers, params, body, auth,
                    response_status, response_headers, response_body, response_time,
                    error, executed_at, executed_by
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.id.to_string(),
                    record.template_id.to_string(),
                    record.url,
                    record.method,
                    headers,
                    params_text,
                    body,
                    auth,
                    record.response_status.map(i64::from),
                    response_headers,
                    response_body,
                    record.response_time,
                    record.error,
                    format_timestamp(&record.executed_at),
                    record.executed_by,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn recent(
        &self,
        template_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, EngineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, template_id, url, method, headers, params, body, auth,
                        response_status, response_headers, response_body, response_time,
                        error, executed_at, executed_by
                 FROM execution_records
                 WHERE template_id = ?1
                 ORDER BY executed_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![template_id.to_string(), limit], RawRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRow::into_record).collect()
        })
        .await
    }

    async fn delete_for_template(&self, template_id: Uuid) -> Result<usize, EngineError> {
        self.call(move |conn| {
            Ok(conn.execute(
                "DELETE FROM execution_records WHERE template_id = ?1",
                params![template_id.to_string()],
            )?)
        })
        .await
    }

    /// Non-blocking: `records` is null while a write holds the connection.
    fn stats(&self) -> Value {
        let records = self.conn.try_lock().ok().and_then(|conn| {
            conn.query_row("SELECT COUNT(*) FROM execution_records", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .ok()
            .flatten()
        });
        serde_json::json!({
            "store": "sqlite",
            "path": self.path.as_ref().map(|p| p.display().to_string()),
            "records": records,
        })
    }
}
