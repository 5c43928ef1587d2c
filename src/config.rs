//! Runtime configuration for the proxy binary (SPEC_FULL.md §9, "Config").
//!
//! No environment variables are mandated by the core (spec.md §6). Startup
//! configuration is a plain struct with `Default`, constructed
//! programmatically in `main`, matching the teacher's `ServerLimits`/
//! `ConnLimits` idiom (`limits.rs`) rather than introducing a config-file
//! crate the teacher never used.

use std::net::SocketAddr;
use std::time::Duration;

/// Defaults for a freshly created `InterceptSession`'s `Options` (spec.md
/// §4.4): `(listen_port=8080, intercept_client=true, intercept_server=true,
/// stall_enabled=false)`.
#[derive(Debug, Clone)]
pub struct ProxyDefaults {
    pub listen_port: u16,
    pub intercept_client: bool,
    pub intercept_server: bool,
    pub stall_enabled: bool,
}

impl Default for ProxyDefaults {
    fn default() -> Self {
        ProxyDefaults {
            listen_port: 8080,
            intercept_client: true,
            intercept_server: true,
            stall_enabled: false,
        }
    }
}

/// Buffer/timeout knobs for the interception engine's own socket I/O.
/// Distinct from the teacher's `ConnLimits`, which governs the ambient API
/// surface's HTTP connections, not the proxy's raw-socket transactions.
#[derive(Debug, Clone)]
pub struct ProxyLimits {
    /// Starting capacity for each `ByteBuffer` (spec.md §6: `65,535`).
    pub buffer_capacity: usize,
    /// Ceiling on how long `ConnectionHandler` waits to dial upstream before
    /// reporting `UpstreamUnreachable`.
    pub upstream_dial_timeout: Duration,
}

impl Default for ProxyLimits {
    fn default() -> Self {
        ProxyLimits {
            buffer_capacity: crate::engine::buffer::DEFAULT_CAPACITY,
            upstream_dial_timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level binary configuration: where the REST/WebSocket control surface
/// listens, and where the SQLite file lives.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_addr: SocketAddr,
    pub database_path: String,
    pub proxy_defaults: ProxyDefaults,
    pub proxy_limits: ProxyLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_addr: ([127, 0, 0, 1], 8888).into(),
            database_path: "./db.sqlite".to_string(),
            proxy_defaults: ProxyDefaults::default(),
            proxy_limits: ProxyLimits::default(),
        }
    }
}
