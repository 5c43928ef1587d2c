//! Persistence-layer error type.
//!
//! Unlike `crate::errors::ErrorKind` (hand-rolled, matching the teacher's
//! HTTP-framework idiom) or `crate::engine::errors::ProxyError` (hand-rolled,
//! matching the same idiom for the core), this layer has no teacher
//! precedent to imitate — `maker_web` never touches a database. Grounded
//! instead in the broader retrieval pack's convention for layered
//! network-service errors (`other_examples/manifests/brayniac-momento-proxy`
//! uses `thiserror` for exactly this kind of wrapping enum), per SPEC_FULL.md §7.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("project not found: {0}")]
    ProjectNotFound(uuid::Uuid),

    #[error("request not found: {0}")]
    RequestNotFound(uuid::Uuid),

    #[error("response not found: {0}")]
    ResponseNotFound(uuid::Uuid),
}
