//! Raw accept loop for the control-channel WebSocket upgrade
//! (`GET /projects/:id/proxy`, spec.md §4.2).
//!
//! Bound on its own listener rather than folded into [`rest`](super::rest)'s
//! pooled `Server`: the teacher's [`Handler`](crate::Handler) trait only ever
//! hands a route `&Request`/`&mut Response`, never the raw
//! [`TcpStream`](tokio::net::TcpStream) an upgrade needs to hold onto past
//! the handshake, so this loop talks to `tokio-tungstenite` directly instead
//! (see DESIGN.md for the full justification of the split).

use std::sync::{Arc, Mutex as StdMutex};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{InterceptSession, Router};
use crate::store::{RecordStore, StoreError};

use super::ApiState;

/// Accepts connections on `listener` forever, upgrading each to a control
/// WebSocket and driving its proxy listener to completion in its own task.
pub async fn serve<S: RecordStore>(listener: TcpListener, state: Arc<ApiState<S>>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "control listener accept failed");
                continue;
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = attach(stream, state).await {
                warn!(%peer, %err, "control channel attach failed");
            }
        });
    }
}

fn reject(status: u16, message: &str) -> ErrorResponse {
    http::Response::builder()
        .status(status)
        .body(Some(message.to_string()))
        .expect("static error response always builds")
}

/// Parses `/projects/<uuid>/proxy`, rejecting anything else.
fn parse_project_id(path: &str) -> Option<Uuid> {
    let mut parts = path.trim_start_matches('/').split('/');
    if parts.next()? != "projects" {
        return None;
    }
    let id = Uuid::parse_str(parts.next()?).ok()?;
    if parts.next()? != "proxy" {
        return None;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(id)
}

async fn attach<S: RecordStore>(stream: TcpStream, state: Arc<ApiState<S>>) -> Result<(), String> {
    let project_id_slot: StdMutex<Option<Uuid>> = StdMutex::new(None);

    let handshake = accept_hdr_async(stream, |req: &Request, resp: Response| {
        match parse_project_id(req.uri().path()) {
            Some(id) => {
                *project_id_slot.lock().unwrap() = Some(id);
                Ok(resp)
            }
            None => Err(reject(404, "unrecognized control path")),
        }
    })
    .await;

    let socket = handshake.map_err(|err| err.to_string())?;
    let project_id = project_id_slot
        .into_inner()
        .unwrap()
        .expect("callback always runs before accept_hdr_async resolves Ok");

    match state.store.get_project(project_id).await {
        Ok(_) => {}
        Err(StoreError::ProjectNotFound(_)) => {
            return Err(format!("no such project: {project_id}"));
        }
        Err(err) => return Err(err.to_string()),
    }

    let session = InterceptSession::spawn(project_id, state.store.clone(), &state.defaults, socket);

    if !state.register(project_id, session.clone()).await {
        return Err(format!("project {project_id} already has an active control channel"));
    }

    info!(%project_id, "control channel attached");

    let result = Router::run(&session).await;
    state.unregister(project_id).await;

    result.map_err(|err| err.to_string())
}
