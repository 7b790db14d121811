use std::io;
use thiserror::Error;

/// Errors that can occur in the mdmath server.
///
/// Variants fall into three classes: fatal errors that terminate the process
/// (malformed protocol traffic, startup failures), domain errors that map to
/// a per-request `error` frame (empty or untypesettable equations), and
/// system errors from external collaborator processes, which also map to an
/// `error` frame but carry a `system error:` prefix so the host can tell
/// them apart.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed wire traffic: truncated field, bad integer, invalid UTF-8
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Color field did not match `#rrggbb`
    #[error("Invalid color format: {0}")]
    InvalidColor(String),

    /// Message carried a type tag the server does not know
    #[error("Identifier {identifier}: Invalid request type: {kind}")]
    UnknownRequestType { identifier: String, kind: String },

    /// Render request with empty or whitespace-only source text
    #[error("Empty equation")]
    EmptyEquation,

    /// The typesetting collaborator rejected the equation
    #[error("{0}")]
    Typeset(String),

    /// An external collaborator process failed to spawn, exited non-zero,
    /// or produced unusable output
    #[error("system error: {tool}: {message}")]
    Collaborator { tool: String, message: String },

    /// Failure before the dispatch loop started (scratch directory,
    /// missing collaborator binary)
    #[error("Startup error: {0}")]
    Startup(String),

    /// IO error on the wire streams
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Type alias for Result with ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Whether this error terminates the process instead of producing a
    /// per-request `error` frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Protocol(_)
                | ServerError::InvalidColor(_)
                | ServerError::UnknownRequestType { .. }
                | ServerError::Startup(_)
                | ServerError::Io(_)
        )
    }

    /// Convenience constructor for collaborator failures.
    pub fn collaborator(tool: &str, message: impl Into<String>) -> Self {
        ServerError::Collaborator {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}
