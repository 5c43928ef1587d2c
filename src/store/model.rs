//! Persisted record shapes (spec.md §3).
//!
//! Field names and table layout are grounded in
//! `original_source/server/internal/data/{project,request,response}.go`
//! and `internal/data/history/history.go`, extended with the columns that
//! source was missing (`responseid`/`requestid` cross-references, `url`,
//! `ipaddr` as distinct from `domain`) since spec.md's data model mandates
//! them (SPEC_FULL.md §3).
//!
//! `id`/`project_id`/etc. are `Uuid` here for an ergonomic Rust API, but are
//! stored and queried as TEXT columns (`Uuid::to_string`/`Uuid::parse_str`),
//! not through sqlx's built-in `Uuid` column codec — on SQLite that codec
//! round-trips through a BLOB, and spec.md's data model (and the original's
//! `uuid.NewString()`) call for a human-readable TEXT primary key. Row
//! mapping in `store::sqlite` is therefore done by hand rather than via
//! `#[derive(sqlx::FromRow)]`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// An engagement that requests/responses are grouped under (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created: DateTime<Utc>,
}

/// One intercepted client request (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: Uuid,
    pub project_id: Uuid,
    pub response_id: Uuid,
    pub method: String,
    pub domain: String,
    pub ipaddr: String,
    pub url: String,
    pub length: i64,
    pub edited: bool,
    pub timestamp: DateTime<Utc>,
    pub comment: String,
    pub raw: String,
}

/// One upstream response, paired 1:1 with the `Request` that produced it
/// (spec.md §3).
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub id: Uuid,
    pub project_id: Uuid,
    pub request_id: Uuid,
    pub status: i32,
    pub length: i64,
    /// Elapsed time between dispatch and fully-read response, in nanoseconds
    /// (spec.md §3's recommended unit).
    pub elapsed: i64,
    pub edited: bool,
    pub timestamp: DateTime<Utc>,
    pub mimetype: String,
    pub comment: String,
    pub raw: String,
}

/// One row of the request/response join (spec.md §6), ordered by
/// `request.timestamp` and filtered by project. Grounded in
/// `original_source/server/internal/data/history/history.go`'s `HistoryEntry`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub idx: i64,
    pub method: String,
    pub status: i32,
    pub target: String,
    pub url: String,
    pub ipaddr: String,
    pub length: i64,
    pub timestamp: DateTime<Utc>,
    pub edited: bool,
    pub comment: String,
    pub request_id: Uuid,
    pub response_id: Uuid,
}
