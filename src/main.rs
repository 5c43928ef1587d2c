//! Binary entry point: wires `AppConfig`, the SQLite store, the REST surface
//! (teacher's pooled `Server`), and the control-channel WebSocket listener
//! (SPEC_FULL.md §9).

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use wiretap::api::{control, rest::RestHandler, ApiState};
use wiretap::config::AppConfig;
use wiretap::store::SqliteStore;
use wiretap::Server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::default();

    let store = Arc::new(
        SqliteStore::connect(&config.database_path)
            .await
            .expect("failed to open sqlite store"),
    );
    let state = ApiState::new(store, config.proxy_defaults.clone());

    let control_addr = std::net::SocketAddr::new(config.api_addr.ip(), config.api_addr.port() + 1);
    let control_listener = TcpListener::bind(control_addr)
        .await
        .expect("failed to bind control listener");
    info!(addr = %control_addr, "control listener bound");
    let control_state = state.clone();
    tokio::spawn(async move { control::serve(control_listener, control_state).await });

    let rest_listener = TcpListener::bind(config.api_addr)
        .await
        .expect("failed to bind REST listener");
    info!(addr = %config.api_addr, "REST listener bound");

    Server::builder()
        .listener(rest_listener)
        .handler(RestHandler::new(state))
        .build()
        .launch()
        .await;
}
