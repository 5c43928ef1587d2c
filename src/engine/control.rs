//! Operator control protocol: command parsing/validation (spec.md §4.3) and
//! the notification envelope sent the other way when a transaction stalls.
//!
//! Grounded in `original_source/server/internal/api/get_project_proxy.go`'s
//! `HandleProxy`, which unmarshals each WebSocket text frame into a
//! `proxy.ProxyCmd` and validates it before sending it onto a Go channel.
//! The teacher crate has no JSON/control-protocol precedent of its own
//! (`maker_web` only speaks wire-level HTTP), so this module's wire-form
//! uses `serde`/`serde_json` directly rather than imitating a teacher file
//! that doesn't exist; the *validation* style (a shadow struct converted via
//! `TryFrom` into a checked enum) matches the teacher's preference for
//! parse functions that return `Result<T, ErrorKind>` (`http/types.rs`'s
//! `Method::from_bytes`, `Version::from_bytes`) over panicking constructors.

use serde::{Deserialize, Serialize};

use crate::engine::errors::ProxyError;

/// A validated operator command (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Begin intercepting (direction toggles live on `session::Options`).
    Start,
    /// Stop intercepting.
    Stop,
    /// Toggle the stall flag without starting/stopping interception.
    Stall,
    /// Release a stalled message, replacing its bytes with `data`.
    Forward(Vec<u8>),
    /// Release a stalled message by discarding it.
    Drop,
}

impl Command {
    pub const fn kind(&self) -> i32 {
        match self {
            Command::Start => 1,
            Command::Stop => 2,
            Command::Stall => 3,
            Command::Forward(_) => 4,
            Command::Drop => 5,
        }
    }
}

/// Wire shape: `{"type": <int 0..5>, "data": <string>}`.
#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(rename = "type")]
    kind: i32,
    #[serde(default)]
    data: String,
}

impl TryFrom<RawCommand> for Command {
    type Error = ProxyError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        match raw.kind {
            1 if raw.data.is_empty() => Ok(Command::Start),
            2 if raw.data.is_empty() => Ok(Command::Stop),
            3 if raw.data.is_empty() => Ok(Command::Stall),
            4 if !raw.data.is_empty() => Ok(Command::Forward(raw.data.into_bytes())),
            5 if raw.data.is_empty() => Ok(Command::Drop),
            4 => Err(ProxyError::NilBuffer),
            0 => Err(ProxyError::UnknownCommand),
            1..=5 => Err(ProxyError::InvalidCommand),
            _ => Err(ProxyError::UnknownCommand),
        }
    }
}

impl Command {
    /// Parse and validate one control-channel text frame.
    pub fn parse(frame: &str) -> Result<Command, ProxyError> {
        let raw: RawCommand =
            serde_json::from_str(frame).map_err(|_| ProxyError::InvalidCommand)?;
        Command::try_from(raw)
    }
}

/// Which half of a transaction stalled, sent to the operator so they know
/// what `data` in a matching `StallNotification` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StallDirection {
    Request,
    Response,
}

/// Sent to the operator over the control channel when a transaction stalls,
/// carrying the raw bytes for inspection before they decide Forward/Drop.
///
/// Kept on the wire as the same `{"type": <int>, "data": <string>}` shape as
/// every other control command (spec.md §6) with `direction` riding along as
/// an extra field — enrichment the spec's wire table doesn't forbid, since
/// operators juggling both a stalled request and the response it produces
/// need to know which one `data` refers to.
#[derive(Debug, Clone, Serialize)]
pub struct StallNotification {
    #[serde(rename = "type")]
    kind: i32,
    pub direction: StallDirection,
    /// Raw HTTP bytes, lossily decoded to UTF-8 (spec.md §9: binary-unsafe
    /// stall frames are a known, preserved limitation, not silently fixed).
    pub data: String,
}

impl StallNotification {
    pub fn new(direction: StallDirection, bytes: &[u8]) -> Self {
        StallNotification {
            kind: Command::Stall.kind(),
            direction,
            data: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("StallNotification is always serializable")
    }
}
