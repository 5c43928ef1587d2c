//! Ambient REST + WebSocket surface (SPEC_FULL.md §9, "API").
//!
//! Split across two listeners rather than one, a deliberate deviation from
//! the original's single `net/http` mux (see DESIGN.md): the teacher's
//! [`Handler`](crate::Handler) trait hands a route only `&Request`/
//! `&mut Response`, never the raw [`TcpStream`](tokio::net::TcpStream) a
//! WebSocket upgrade needs, so `rest` dogfoods the teacher's pooled
//! `Server`/`Handler` framework for the plain-JSON project/history routes
//! while `control` runs its own minimal accept loop for
//! `GET /projects/:id/proxy`.

pub mod control;
pub mod rest;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ProxyDefaults;
use crate::engine::InterceptSession;
use crate::store::RecordStore;

/// Shared state handed to both listeners: the record store, the defaults a
/// freshly upgraded control channel seeds its `Options` with, and a registry
/// of sessions currently attached so a project can't be proxied by two
/// control channels at once (spec.md §4.4).
pub struct ApiState<S: RecordStore> {
    pub store: Arc<S>,
    pub defaults: ProxyDefaults,
    sessions: Mutex<HashMap<Uuid, Arc<InterceptSession<S>>>>,
}

impl<S: RecordStore> ApiState<S> {
    pub fn new(store: Arc<S>, defaults: ProxyDefaults) -> Arc<Self> {
        Arc::new(ApiState {
            store,
            defaults,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Registers a freshly spawned session, returning `false` (and refusing
    /// to register) if one is already attached for this project.
    async fn register(&self, project_id: Uuid, session: Arc<InterceptSession<S>>) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&project_id) {
            return false;
        }
        sessions.insert(project_id, session);
        true
    }

    async fn unregister(&self, project_id: Uuid) {
        self.sessions.lock().await.remove(&project_id);
    }
}
