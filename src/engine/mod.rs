//! The interception engine (spec.md's THE CORE): wire rewriting, the
//! operator control protocol, per-session state, the per-connection
//! transaction state machine, and the listener that drives it.

pub mod buffer;
pub mod connection;
pub mod control;
pub mod errors;
pub mod router;
pub mod session;
pub mod wire;

pub use connection::ConnectionHandler;
pub use errors::ProxyError;
pub use router::Router;
pub use session::{InterceptSession, Options};
