//! # mdmath-server
//!
//! Equation rendering backend for editor math-preview plugins. Speaks a
//! private length-aware framed protocol over stdin/stdout: the host sends
//! render and configuration messages, the server typesets equations through
//! external collaborator tools, writes PNG artifacts into a per-process
//! scratch directory, and answers with the artifact path and its terminal
//! cell footprint. All artifacts are removed at teardown, on normal exit
//! and on termination signals alike.

pub mod config;
pub mod errors;
pub mod protocol;
pub mod raster;
pub mod render;
pub mod server;
pub mod typeset;

pub use config::{ScaleKind, SessionConfig};
pub use errors::{Result, ServerError};
