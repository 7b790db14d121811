//! Response serialization.
//!
//! Exactly one frame per handled request. The trailing payload (file path or
//! error message) is length-prefixed so the host can read it back even when
//! it contains the delimiter; no terminator follows the payload.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::errors::Result;

/// Result of handling one render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `identifier:image:width:height:length:path`
    Image {
        identifier: String,
        /// Footprint in terminal cells
        width: u32,
        height: u32,
        path: String,
    },
    /// `identifier:error:0:0:length:message`
    Error { identifier: String, message: String },
}

impl Response {
    pub fn error(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Encodes the frame exactly as it goes on the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Image {
                identifier,
                width,
                height,
                path,
            } => {
                let payload = path.as_bytes();
                let mut frame =
                    format!("{identifier}:image:{width}:{height}:{}:", payload.len()).into_bytes();
                frame.extend_from_slice(payload);
                frame
            }
            Response::Error {
                identifier,
                message,
            } => {
                let payload = message.as_bytes();
                let mut frame =
                    format!("{identifier}:error:0:0:{}:", payload.len()).into_bytes();
                frame.extend_from_slice(payload);
                frame
            }
        }
    }
}

/// Writes response frames onto the output stream, flushing per response so
/// the host never waits on a buffered partial frame.
pub struct ResponseWriter<W> {
    sink: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub async fn write(&mut self, response: &Response) -> Result<()> {
        self.sink.write_all(&response.encode()).await?;
        self.sink.flush().await?;
        Ok(())
    }
}
