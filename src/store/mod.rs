//! Relational persistence for `Project`/`Request`/`Response` (spec.md §3,
//! §6; SPEC_FULL.md §4.6). Named a collaborator by spec.md, but a concrete
//! implementation is required for the binary to do anything end to end.

pub(crate) mod errors;
pub(crate) mod model;
pub(crate) mod schema;
pub(crate) mod sqlite;

pub use errors::StoreError;
pub use model::{HistoryEntry, Project, Request, Response};
pub use sqlite::SqliteStore;

use std::future::Future;
use uuid::Uuid;

/// Persistence operations the interception engine and the REST surface rely
/// on (SPEC_FULL.md §4.6). `Send + Sync` so a single store can be shared
/// behind an `Arc` across every `InterceptSession` and the API server.
pub trait RecordStore: Send + Sync + 'static {
    fn insert_project(
        &self,
        title: String,
        description: String,
    ) -> impl Future<Output = Result<Project, StoreError>> + Send;

    fn get_project(&self, id: Uuid) -> impl Future<Output = Result<Project, StoreError>> + Send;

    fn list_projects(&self) -> impl Future<Output = Result<Vec<Project>, StoreError>> + Send;

    /// Inserts a request row and its paired response row as a single atomic
    /// unit (spec.md §3's atomic-pair invariant: "either persists both …
    /// or neither"). Callers must pre-allocate `request.id`/`request.response_id`
    /// and `response.id`/`response.request_id` before calling (spec.md §4.5's
    /// "Commit step") so each half can reference the other. A failure on
    /// either insert must leave neither row visible.
    fn commit_pair(
        &self,
        request: &Request,
        response: &Response,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_request(&self, id: Uuid) -> impl Future<Output = Result<Request, StoreError>> + Send;

    fn get_response(&self, id: Uuid) -> impl Future<Output = Result<Response, StoreError>> + Send;

    /// The request/response natural join for one project, ordered by
    /// `request.timestamp` (spec.md §6).
    fn history(&self, project_id: Uuid) -> impl Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send;
}
