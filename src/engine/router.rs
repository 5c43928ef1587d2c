//! Accept loop binding one `InterceptSession`'s listen port (spec.md §4.4,
//! §5).
//!
//! Grounded in `original_source/server/internal/proxy/proxy.go`'s `Spawn`,
//! which binds a listener and, on each accept, dispatches the connection
//! inline rather than spawning a goroutine per connection — spec.md §5 turns
//! that into an explicit invariant ("at most one transaction in flight per
//! `InterceptSession`"), so dispatch here is a plain `.await`, never
//! `tokio::spawn`.

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::engine::connection::ConnectionHandler;
use crate::engine::session::InterceptSession;
use crate::store::RecordStore;

pub struct Router;

impl Router {
    /// Binds `session.options.listen_port` on all interfaces and serves
    /// connections one at a time until the listener errors out (spec.md §5:
    /// closing the control channel ends the session, but the listener itself
    /// keeps running independently — the caller decides when to stop polling
    /// it, typically by racing this future against the control task's exit).
    pub async fn run<S: RecordStore>(session: &InterceptSession<S>) -> std::io::Result<()> {
        let addr = ("0.0.0.0", session.options.listen_port);
        let listener = TcpListener::bind(addr).await?;
        info!(project_id = %session.project_id, port = session.options.listen_port, "proxy listener bound");

        loop {
            let (stream, _peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(project_id = %session.project_id, %err, "accept failed");
                    continue;
                }
            };

            ConnectionHandler::run(stream, session).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use uuid::Uuid;

    use super::*;
    use crate::config::ProxyDefaults;
    use crate::store::{HistoryEntry, Project, Request as StoredRequest, Response as StoredResponse, StoreError};

    struct NullStore;

    impl RecordStore for NullStore {
        async fn insert_project(&self, _title: String, _description: String) -> Result<Project, StoreError> {
            unreachable!()
        }
        async fn get_project(&self, id: Uuid) -> Result<Project, StoreError> {
            Err(StoreError::ProjectNotFound(id))
        }
        async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
            Ok(Vec::new())
        }
        async fn commit_pair(&self, _request: &StoredRequest, _response: &StoredResponse) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_request(&self, id: Uuid) -> Result<StoredRequest, StoreError> {
            Err(StoreError::RequestNotFound(id))
        }
        async fn get_response(&self, id: Uuid) -> Result<StoredResponse, StoreError> {
            Err(StoreError::ResponseNotFound(id))
        }
        async fn history(&self, _project_id: Uuid) -> Result<Vec<HistoryEntry>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// A malformed transaction doesn't tear down the listener: a second,
    /// independent connection right after it is still accepted and served.
    #[tokio::test]
    async fn survives_a_malformed_connection_and_keeps_accepting() {
        let defaults = ProxyDefaults {
            listen_port: 18_734,
            ..ProxyDefaults::default()
        };
        let (session, _intercept_tx, _stall_rx) =
            InterceptSession::new_for_test(Uuid::new_v4(), Arc::new(NullStore), &defaults);

        let router = tokio::spawn(async move { Router::run(&session).await });
        // Give the listener a moment to bind before the first connect attempt.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let addr: std::net::SocketAddr = "127.0.0.1:18734".parse().unwrap();

        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(b"not a request\r\n\r\n").await.unwrap();
        let mut buf = Vec::new();
        let _ = bad.read_to_end(&mut buf).await;
        drop(bad);

        let mut good = TcpStream::connect(addr).await.unwrap();
        good.write_all(b"GET /x HTTP/1.1\r\nHost: 127.0.0.1:1\r\n\r\n").await.unwrap();
        // No upstream listens on port 1, so this transaction also fails to
        // dial — the point is only that the listener accepted a second
        // connection after the first one misbehaved.
        let mut buf2 = Vec::new();
        let _ = good.read_to_end(&mut buf2).await;

        router.abort();
    }
}
