//! Debugger errors.

use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DebuggerError {
    /// A session was started while the previous one is still running.
    #[error("debugging session started while the previous one has not finished")]
    SessionActive,

    /// A command was sent with no debuggee attached.
    #[error("no debuggee attached to send {method}")]
    TransportUnavailable { method: SmolStr },

    /// The transport failed to deliver a command.
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(SmolStr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
