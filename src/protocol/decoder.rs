//! Request decoding.
//!
//! One message per logical unit: `identifier:type:...` with type-specific
//! fields after the tag. Equation source text is length-prefixed because it
//! may contain the delimiter.

use std::sync::OnceLock;

use regex::Regex;
use tokio::io::AsyncRead;

use crate::config::ScaleKind;
use crate::errors::{Result, ServerError};
use crate::protocol::reader::FrameReader;

/// Bitset carried by render requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderFlags(u32);

impl RenderFlags {
    pub const DYNAMIC: u32 = 1 << 0;
    pub const CENTER: u32 = 1 << 1;

    pub fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Resolve the cell footprint from the rendered content's natural size.
    pub fn dynamic(self) -> bool {
        self.0 & Self::DYNAMIC != 0
    }

    /// Center the artifact within its cell footprint.
    pub fn center(self) -> bool {
        self.0 & Self::CENTER != 0
    }
}

/// One equation to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub identifier: String,
    pub source: String,
    /// Width of one terminal cell in pixels
    pub cell_width: u32,
    /// Height of one terminal cell in pixels
    pub cell_height: u32,
    /// Requested footprint in cells (a floor when dynamic sizing is on)
    pub width: u32,
    pub height: u32,
    pub flags: RenderFlags,
    /// Normalized `#rrggbb`, always lowercase
    pub color: String,
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Render(RenderRequest),
    SetScale {
        identifier: String,
        kind: ScaleKind,
        value: f64,
    },
    SetColor {
        identifier: String,
        color: String,
    },
}

/// Decodes exactly one request from the stream.
///
/// Returns `Ok(None)` when the stream closed cleanly between messages.
/// Malformed fields, invalid colors and unknown type tags are protocol
/// errors; the caller terminates on those since the protocol has no
/// envelope-level error channel.
pub async fn decode<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> Result<Option<Request>> {
    if !reader.await_readable().await? {
        return Ok(None);
    }

    let identifier = reader.read_delimited().await?;
    let kind = reader.read_delimited().await?;

    let request = match kind.as_str() {
        "request" => {
            let flags = RenderFlags::new(read_u32(reader, "flags").await?);
            let color = validate_color(&reader.read_delimited().await?)?;
            let cell_width = read_u32(reader, "cellWidth").await?;
            let width = read_u32(reader, "width").await?;
            let cell_height = read_u32(reader, "cellHeight").await?;
            let height = read_u32(reader, "height").await?;
            let length = read_u32(reader, "length").await?;
            let source = reader.read_fixed_string(length as usize).await?;

            Request::Render(RenderRequest {
                identifier,
                source,
                cell_width,
                cell_height,
                width,
                height,
                flags,
                color,
            })
        }
        "iscale" | "dscale" => {
            let scale_kind = if kind == "iscale" {
                ScaleKind::Internal
            } else {
                ScaleKind::Dynamic
            };
            Request::SetScale {
                identifier,
                kind: scale_kind,
                value: reader.read_delimited_float().await?,
            }
        }
        "color" => {
            let color = validate_color(&reader.read_delimited().await?)?;
            Request::SetColor { identifier, color }
        }
        _ => return Err(ServerError::UnknownRequestType { identifier, kind }),
    };

    Ok(Some(request))
}

async fn read_u32<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    field: &str,
) -> Result<u32> {
    let value = reader.read_delimited_int().await?;
    u32::try_from(value)
        .map_err(|_| ServerError::Protocol(format!("field {field} out of range: {value}")))
}

#[allow(clippy::expect_used)]
fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^#[0-9a-f]{6}$").expect("valid color pattern"))
}

/// Lowercases and validates a `#rrggbb` color field.
pub fn validate_color(raw: &str) -> Result<String> {
    let color = raw.to_ascii_lowercase();
    if color_pattern().is_match(&color) {
        Ok(color)
    } else {
        Err(ServerError::InvalidColor(raw.to_string()))
    }
}
