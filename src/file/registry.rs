//! File registry: persistent mapping from file id to metadata.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use super::{FileId, FileRecord};
use crate::{FilehostError, Result};

/// Metadata store for uploaded files.
///
/// A record exists iff its blob should exist. Records are never edited in
/// place; the only mutations are create and delete.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Insert a new record. Fails if the id is already taken.
    async fn create(&self, record: &FileRecord) -> Result<()>;

    /// Get a record by id.
    async fn get(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// List every record in insertion order.
    async fn list(&self) -> Result<Vec<FileRecord>>;

    /// List records whose expiry time is set and strictly before `now`.
    async fn list_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete(&self, id: &FileId) -> Result<bool>;
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FilehostError::Registry(format!("bad timestamp {s:?}: {e}")))
}

/// Database row for a file.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: String,
    name: String,
    size: i64,
    content_type: String,
    upload_time: String,
    expiry_time: Option<String>,
    password_hash: Option<String>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = FilehostError;

    fn try_from(row: FileRow) -> Result<Self> {
        let id = FileId::parse(&row.id)
            .map_err(|_| FilehostError::Registry(format!("bad file id in registry: {}", row.id)))?;

        Ok(FileRecord {
            id,
            name: row.name,
            size: row.size.max(0) as u64,
            content_type: row.content_type,
            upload_time: from_db_time(&row.upload_time)?,
            expiry_time: row.expiry_time.as_deref().map(from_db_time).transpose()?,
            password_hash: row.password_hash,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, size, content_type, upload_time, expiry_time, password_hash FROM files";

/// SQLite-backed registry.
#[derive(Debug, Clone)]
pub struct SqliteFileRegistry {
    pool: SqlitePool,
}

impl SqliteFileRegistry {
    /// Create a registry over the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn collect(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
        rows.into_iter().map(FileRecord::try_from).collect()
    }
}

#[async_trait]
impl FileRegistry for SqliteFileRegistry {
    async fn create(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (id, name, size, content_type, upload_time, expiry_time, password_hash)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(record.size as i64)
        .bind(&record.content_type)
        .bind(to_db_time(&record.upload_time))
        .bind(record.expiry_time.as_ref().map(to_db_time))
        .bind(&record.password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &FileId) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY seq"))
            .fetch_all(&self.pool)
            .await?;

        Self::collect(rows)
    }

    async fn list_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE expiry_time IS NOT NULL AND expiry_time < ? ORDER BY seq"
        ))
        .bind(to_db_time(&now))
        .fetch_all(&self.pool)
        .await?;

        Self::collect(rows)
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
