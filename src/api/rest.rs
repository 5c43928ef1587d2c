//! Plain-JSON project/history routes (spec.md §6), dogfooding the teacher's
//! pooled [`Handler`](crate::Handler)/[`Server`](crate::Server) framework —
//! grounded in `src/server/server_impl.rs`'s `ServerBuilder` and
//! `impt_default_handler!`'s `Handler<()> for $name` shape (`lib.rs`).
//!
//! Grounded in `original_source/server/internal/api/{create_project,
//! get_projects,get_project_history}.go` for the route set and status codes.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::store::{RecordStore, StoreError};
use crate::{Handled, Handler, Request, Response, StatusCode};

use super::ApiState;

const TITLE_MIN: usize = 6;
const TITLE_MAX: usize = 64;

pub struct RestHandler<S: RecordStore> {
    state: Arc<ApiState<S>>,
}

impl<S: RecordStore> RestHandler<S> {
    pub fn new(state: Arc<ApiState<S>>) -> Self {
        RestHandler { state }
    }
}

#[derive(Deserialize)]
struct CreateProjectBody {
    title: String,
    #[serde(default)]
    description: String,
}

fn error_body(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

fn parse_path_uuid(segment: &[u8]) -> Option<Uuid> {
    std::str::from_utf8(segment).ok().and_then(|s| Uuid::parse_str(s).ok())
}

impl<S: RecordStore> Handler<()> for RestHandler<S> {
    async fn handle(&self, _: &mut (), req: &Request, resp: &mut Response) -> Handled {
        let segments = req.url().path_segments();

        match (req.method(), segments) {
            (crate::Method::Post, [b"projects"]) => self.create_project(req, resp).await,
            (crate::Method::Get, [b"projects"]) => self.list_projects(resp).await,
            (crate::Method::Get, [b"projects", id]) => self.get_project(id, resp).await,
            (crate::Method::Get, [b"projects", id, b"history"]) => self.history(id, resp).await,
            _ => resp
                .status(StatusCode::NotFound)
                .header("content-type", "application/json")
                .body(error_body("no such route")),
        }
    }
}

impl<S: RecordStore> RestHandler<S> {
    async fn create_project(&self, req: &Request, resp: &mut Response) -> Handled {
        let Some(body) = req.body() else {
            return resp
                .status(StatusCode::BadRequest)
                .header("content-type", "application/json")
                .body(error_body("missing request body"));
        };

        let payload: CreateProjectBody = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(_) => {
                return resp
                    .status(StatusCode::BadRequest)
                    .header("content-type", "application/json")
                    .body(error_body("malformed JSON body"));
            }
        };

        let title_len = payload.title.chars().count();
        if !(TITLE_MIN..=TITLE_MAX).contains(&title_len) {
            return resp
                .status(StatusCode::BadRequest)
                .header("content-type", "application/json")
                .body(error_body("title must be 6-64 characters"));
        }

        match self.state.store.insert_project(payload.title, payload.description).await {
            Ok(project) => resp
                .status(StatusCode::Created)
                .header("content-type", "application/json")
                .body(serde_json::to_string(&project).expect("Project always serializes")),
            Err(err) => Self::store_error(resp, err),
        }
    }

    async fn list_projects(&self, resp: &mut Response) -> Handled {
        match self.state.store.list_projects().await {
            Ok(projects) => resp
                .status(StatusCode::Ok)
                .header("content-type", "application/json")
                .body(serde_json::to_string(&projects).expect("Vec<Project> always serializes")),
            Err(err) => Self::store_error(resp, err),
        }
    }

    async fn get_project(&self, id: &[u8], resp: &mut Response) -> Handled {
        let Some(id) = parse_path_uuid(id) else {
            return resp
                .status(StatusCode::BadRequest)
                .header("content-type", "application/json")
                .body(error_body("malformed project id"));
        };

        match self.state.store.get_project(id).await {
            Ok(project) => resp
                .status(StatusCode::Ok)
                .header("content-type", "application/json")
                .body(serde_json::to_string(&project).expect("Project always serializes")),
            Err(err) => Self::store_error(resp, err),
        }
    }

    async fn history(&self, id: &[u8], resp: &mut Response) -> Handled {
        let Some(id) = parse_path_uuid(id) else {
            return resp
                .status(StatusCode::BadRequest)
                .header("content-type", "application/json")
                .body(error_body("malformed project id"));
        };

        match self.state.store.history(id).await {
            Ok(entries) => resp
                .status(StatusCode::Ok)
                .header("content-type", "application/json")
                .body(serde_json::to_string(&entries).expect("Vec<HistoryEntry> always serializes")),
            Err(err) => Self::store_error(resp, err),
        }
    }

    fn store_error(resp: &mut Response, err: StoreError) -> Handled {
        match err {
            StoreError::ProjectNotFound(_) | StoreError::RequestNotFound(_) | StoreError::ResponseNotFound(_) => resp
                .status(StatusCode::NotFound)
                .header("content-type", "application/json")
                .body(error_body(&err.to_string())),
            StoreError::Database(_) => resp
                .status(StatusCode::InternalServerError)
                .header("content-type", "application/json")
                .body(error_body("internal store error")),
        }
    }
}
