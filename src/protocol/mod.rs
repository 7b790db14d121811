//! The framed stdin/stdout wire protocol.

pub mod decoder;
pub mod reader;
pub mod writer;

pub use decoder::{decode, Request, RenderFlags, RenderRequest};
pub use reader::{FrameReader, DELIMITER};
pub use writer::{Response, ResponseWriter};
