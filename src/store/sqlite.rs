//! SQLite-backed `RecordStore` (SPEC_FULL.md §4.6).
//!
//! Grounded in `original_source/server/internal/data/connect.go` (a single
//! file-backed SQLite database, created if absent, with each table's
//! `CreateXTable` run once at startup). The crate choice is `sqlx`, not the
//! Go original's `modernc.org/sqlite` (whose closest Rust analogue would be
//! `rusqlite`) — the chosen teacher (`maker_web`) and the rest of this crate
//! are fully `tokio`-async, and `sqlx` is independently represented in the
//! retrieval pack (`other_examples/manifests/sqlpage-sqlx-oldapi`,
//! `other_examples/manifests/daniel-prause-sqlx`).

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::str::FromStr;
use uuid::Uuid;

use super::{
    errors::StoreError,
    model::{HistoryEntry, Project, Request, Response},
    schema, RecordStore,
};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if absent) the SQLite file at `path` and ensures the
    /// schema exists, mirroring the original's `SetupDatabase`.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(schema::CREATE_PROJECTS_TABLE).execute(&pool).await?;
        sqlx::query(schema::CREATE_REQUESTS_TABLE).execute(&pool).await?;
        sqlx::query(schema::CREATE_RESPONSES_TABLE).execute(&pool).await?;

        Ok(SqliteStore { pool })
    }

    fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<Project, StoreError> {
        Ok(Project {
            id: parse_uuid(row, "id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            created: parse_timestamp(row, "created")?,
        })
    }

    fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, StoreError> {
        Ok(Request {
            id: parse_uuid(row, "id")?,
            project_id: parse_uuid(row, "projectid")?,
            response_id: parse_uuid(row, "responseid")?,
            method: row.try_get("method")?,
            domain: row.try_get("domain")?,
            ipaddr: row.try_get("ipaddr")?,
            url: row.try_get("url")?,
            length: row.try_get("length")?,
            edited: row.try_get("edited")?,
            timestamp: parse_timestamp(row, "timestamp")?,
            comment: row.try_get("comment")?,
            raw: row.try_get("raw")?,
        })
    }

    fn row_to_response(row: &sqlx::sqlite::SqliteRow) -> Result<Response, StoreError> {
        Ok(Response {
            id: parse_uuid(row, "id")?,
            project_id: parse_uuid(row, "projectid")?,
            request_id: parse_uuid(row, "requestid")?,
            status: row.try_get("status")?,
            length: row.try_get("length")?,
            elapsed: row.try_get("elapsed")?,
            edited: row.try_get("edited")?,
            timestamp: parse_timestamp(row, "timestamp")?,
            mimetype: row.try_get("mimetype")?,
            comment: row.try_get("comment")?,
            raw: row.try_get("raw")?,
        })
    }
}

fn parse_uuid(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Uuid, StoreError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|_| StoreError::Database(sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: "not a valid UUID".into(),
    }))
}

fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Database(sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: "not an RFC 3339 timestamp".into(),
        }))
}

impl RecordStore for SqliteStore {
    async fn insert_project(&self, title: String, description: String) -> Result<Project, StoreError> {
        let project = Project {
            id: Uuid::new_v4(),
            title,
            description,
            created: Utc::now(),
        };

        sqlx::query("INSERT INTO projects (id, title, description, created) VALUES (?, ?, ?, ?)")
            .bind(project.id.to_string())
            .bind(&project.title)
            .bind(&project.description)
            .bind(project.created.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(project)
    }

    async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
        let row = sqlx::query("SELECT id, title, description, created FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::ProjectNotFound(id))?;

        Self::row_to_project(&row)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query("SELECT id, title, description, created FROM projects")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_project).collect()
    }

    /// Inserts both rows inside one `sqlx` transaction: a failure on either
    /// insert rolls the whole pair back, so a dangling request row can never
    /// persist without its response (spec.md §3's atomic-pair invariant).
    async fn commit_pair(&self, request: &Request, response: &Response) -> Result<(), StoreError> {
        let mut txn = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO requests (
                id, projectid, responseid, method, domain, ipaddr, url,
                length, edited, timestamp, comment, raw
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.project_id.to_string())
        .bind(request.response_id.to_string())
        .bind(&request.method)
        .bind(&request.domain)
        .bind(&request.ipaddr)
        .bind(&request.url)
        .bind(request.length)
        .bind(request.edited)
        .bind(request.timestamp.to_rfc3339())
        .bind(&request.comment)
        .bind(&request.raw)
        .execute(&mut *txn)
        .await?;

        sqlx::query(
            "INSERT INTO responses (
                id, projectid, requestid, status, length, elapsed,
                edited, timestamp, mimetype, comment, raw
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(response.id.to_string())
        .bind(response.project_id.to_string())
        .bind(response.request_id.to_string())
        .bind(response.status)
        .bind(response.length)
        .bind(response.elapsed)
        .bind(response.edited)
        .bind(response.timestamp.to_rfc3339())
        .bind(&response.mimetype)
        .bind(&response.comment)
        .bind(&response.raw)
        .execute(&mut *txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Request, StoreError> {
        let row = sqlx::query(
            "SELECT id, projectid, responseid, method, domain, ipaddr, url,
                    length, edited, timestamp, comment, raw
             FROM requests WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::RequestNotFound(id))?;

        Self::row_to_request(&row)
    }

    async fn get_response(&self, id: Uuid) -> Result<Response, StoreError> {
        let row = sqlx::query(
            "SELECT id, projectid, requestid, status, length, elapsed,
                    edited, timestamp, mimetype, comment, raw
             FROM responses WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ResponseNotFound(id))?;

        Self::row_to_response(&row)
    }

    async fn history(&self, project_id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(schema::HISTORY_QUERY)
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(HistoryEntry {
                    idx: row.try_get("idx")?,
                    method: row.try_get("method")?,
                    status: row.try_get("status")?,
                    target: row.try_get("target")?,
                    url: row.try_get("url")?,
                    ipaddr: row.try_get("ipaddr")?,
                    length: row.try_get("length")?,
                    timestamp: parse_timestamp(row, "timestamp")?,
                    edited: row.try_get("edited")?,
                    comment: row.try_get("comment")?,
                    request_id: parse_uuid(row, "requestid")?,
                    response_id: parse_uuid(row, "responseid")?,
                })
            })
            .collect()
    }
}
