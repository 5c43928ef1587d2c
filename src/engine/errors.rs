//! Error taxonomy for the interception engine (spec.md §7).
//!
//! Kept in the hand-rolled style of the teacher crate's `errors::ErrorKind`
//! (manual `Display`/`Error`, a thin `IoError` wrapper so two errors compare
//! equal when their `io::ErrorKind` matches) rather than pulling in
//! `thiserror` here — ambient layers (`store`, `api`, the control channel's
//! WebSocket transport) use `thiserror` instead, see `DESIGN.md`. This is a
//! separate enum from `crate::errors::ErrorKind` rather than an extension of
//! it: that one renders HTTP error *responses* for the teacher's own
//! `Handler`/`Server` framework (dogfooded by the `api` surface), while this
//! one drives the proxy transaction's unwind/abort decisions and never
//! touches `as_http`.

use std::{error, fmt, io};

/// Errors surfaced by the interception engine (spec.md §7).
///
/// `Dropped` is the only variant that is a signal rather than a fault: an
/// operator `Drop` unwinds the transaction cleanly with no persistence, and
/// callers must not log it as a failure.
#[derive(Debug)]
pub enum ProxyError {
    /// Unparseable HTTP message on either side of the proxy.
    Malformed(&'static str),
    /// The operator chose `Drop` on a stalled message.
    Dropped,
    /// Dialing the upstream host failed.
    UpstreamUnreachable(IoError),
    /// A control message's `type` field didn't match a known command.
    UnknownCommand,
    /// A control message violated the shape rules in spec.md §4.3.
    InvalidCommand,
    /// A `Forward` command arrived with no replacement bytes when required.
    NilBuffer,
    /// The record store rejected an insert.
    PersistenceError(String),
    /// A socket read/write failed during a transaction.
    Transport(IoError),
}

impl error::Error for ProxyError {}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Malformed(why) => write!(f, "malformed HTTP message: {why}"),
            ProxyError::Dropped => write!(f, "message dropped by operator"),
            ProxyError::UpstreamUnreachable(err) => write!(f, "upstream unreachable: {}", err.0),
            ProxyError::UnknownCommand => write!(f, "unknown control command"),
            ProxyError::InvalidCommand => write!(f, "invalid control command"),
            ProxyError::NilBuffer => write!(f, "forward command carried no replacement bytes"),
            ProxyError::PersistenceError(why) => write!(f, "persistence error: {why}"),
            ProxyError::Transport(err) => write!(f, "transport error: {}", err.0),
        }
    }
}

impl From<io::Error> for ProxyError {
    fn from(err: io::Error) -> Self {
        ProxyError::Transport(IoError(err))
    }
}

impl ProxyError {
    /// True for the one error kind that represents a clean, operator-directed
    /// unwind rather than a fault (spec.md §9, "error-as-control-flow for Drop").
    pub const fn is_dropped(&self) -> bool {
        matches!(self, ProxyError::Dropped)
    }
}

#[derive(Debug)]
pub struct IoError(pub io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
