//! Raster conversion collaborator boundary.
//!
//! Two external tools sit behind the [`RasterBackend`] trait: `rsvg-convert`
//! turns SVG markup into PNG bytes (at a zoom factor for the dynamic-sizing
//! probe, or at an exact pixel size), and ImageMagick's `magick` pads or
//! crops those bytes onto the final canvas file. Intrinsic PNG dimensions
//! are read straight from the IHDR chunk instead of shelling out again.

use std::env;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{Result, ServerError};
use crate::typeset::locate_binary;

pub const RSVG_COMMAND_ENV: &str = "MDMATH_RSVG_CONVERT";
pub const MAGICK_COMMAND_ENV: &str = "MDMATH_MAGICK";
const DEFAULT_RSVG_COMMAND: &str = "rsvg-convert";
const DEFAULT_MAGICK_COMMAND: &str = "magick";

/// How the SVG should be rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderSize {
    /// Natural size scaled by a zoom factor (dynamic-sizing probe)
    Zoom(f64),
    /// Exact pixel dimensions
    Pixels(u32, u32),
}

#[async_trait]
pub trait RasterBackend: Send + Sync {
    /// Renders SVG markup to PNG bytes.
    async fn render_svg(&self, svg: &str, size: RenderSize) -> Result<Vec<u8>>;

    /// Fits PNG bytes onto a `width` x `height` canvas and writes the result
    /// to `path`.
    async fn fit_to_file(
        &self,
        png: &[u8],
        path: &Path,
        width: u32,
        height: u32,
        center: bool,
    ) -> Result<()>;
}

/// Production backend spawning `rsvg-convert` and `magick`.
pub struct CommandRaster {
    rsvg: String,
    magick: String,
}

impl CommandRaster {
    /// Resolves both commands from the environment and verifies they exist.
    pub fn from_env() -> Result<Self> {
        let rsvg =
            env::var(RSVG_COMMAND_ENV).unwrap_or_else(|_| DEFAULT_RSVG_COMMAND.to_string());
        let magick =
            env::var(MAGICK_COMMAND_ENV).unwrap_or_else(|_| DEFAULT_MAGICK_COMMAND.to_string());
        locate_binary(&rsvg)?;
        locate_binary(&magick)?;
        debug!(%rsvg, %magick, "raster commands resolved");
        Ok(Self { rsvg, magick })
    }

    async fn run_with_input(&self, tool: &str, mut command: Command, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ServerError::collaborator(tool, err.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|err| ServerError::collaborator(tool, err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| ServerError::collaborator(tool, err.to_string()))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            Err(ServerError::collaborator(tool, message))
        }
    }
}

#[async_trait]
impl RasterBackend for CommandRaster {
    async fn render_svg(&self, svg: &str, size: RenderSize) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.rsvg);
        match size {
            RenderSize::Zoom(zoom) => {
                command.arg("--zoom").arg(zoom.to_string());
            }
            RenderSize::Pixels(width, height) => {
                command.args(["--width", &width.to_string(), "--height", &height.to_string()]);
            }
        }
        self.run_with_input(&self.rsvg, command, svg.as_bytes()).await
    }

    async fn fit_to_file(
        &self,
        png: &[u8],
        path: &Path,
        width: u32,
        height: u32,
        center: bool,
    ) -> Result<()> {
        let size = format!("{width}x{height}");
        let mut command = Command::new(&self.magick);
        command.args(["-background", "none", "png:-"]);
        if center {
            command.args(["-gravity", "center"]);
        }
        command.args(["-extent", &size]);
        command.arg(format!("png:{}", path.display()));

        self.run_with_input(&self.magick, command, png).await?;
        Ok(())
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Reads the intrinsic dimensions from a PNG byte stream.
///
/// The IHDR chunk is mandated to come first, so width and height sit at
/// fixed offsets right after the signature and chunk header.
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return Err(ServerError::collaborator("png", "malformed PNG header"));
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Ok((width, height))
}

/// Builds a minimal PNG prefix with the given dimensions. Lets tests and
/// mock backends exercise the measurement path without a real renderer.
pub fn fake_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(33);
    bytes.extend_from_slice(&PNG_SIGNATURE);
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}
