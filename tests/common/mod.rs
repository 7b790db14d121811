//! Mock collaborators shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use mdmath_server::errors::{Result, ServerError};
use mdmath_server::raster::{fake_png, RasterBackend, RenderSize};
use mdmath_server::typeset::Typesetter;

/// Typesetter that rejects any source starting with `\bad` and wraps
/// everything else in a marker SVG.
pub struct MockTypesetter {
    pub calls: Arc<AtomicUsize>,
}

impl MockTypesetter {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: calls.clone() }, calls)
    }
}

#[async_trait]
impl Typesetter for MockTypesetter {
    async fn typeset(&self, source: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.starts_with("\\bad") {
            Err(ServerError::Typeset("Undefined control sequence".to_string()))
        } else {
            Ok(format!(
                r#"<svg style="color: black" fill="currentColor">{source}</svg>"#
            ))
        }
    }
}

/// Raster backend that fabricates PNG headers instead of spawning tools.
/// Probe renders report `natural` as the intrinsic size; fits write the
/// bytes to disk so teardown has something real to remove.
pub struct MockRaster {
    pub natural: (u32, u32),
    pub fail_render: bool,
    pub render_calls: Arc<AtomicUsize>,
    pub fit_calls: Arc<AtomicUsize>,
}

pub struct RasterCounters {
    pub render: Arc<AtomicUsize>,
    pub fit: Arc<AtomicUsize>,
}

impl MockRaster {
    pub fn new(natural: (u32, u32)) -> (Self, RasterCounters) {
        let render_calls = Arc::new(AtomicUsize::new(0));
        let fit_calls = Arc::new(AtomicUsize::new(0));
        let counters = RasterCounters {
            render: render_calls.clone(),
            fit: fit_calls.clone(),
        };
        (
            Self {
                natural,
                fail_render: false,
                render_calls,
                fit_calls,
            },
            counters,
        )
    }

    pub fn failing() -> Self {
        let (mut raster, _) = Self::new((1, 1));
        raster.fail_render = true;
        raster
    }
}

#[async_trait]
impl RasterBackend for MockRaster {
    async fn render_svg(&self, _svg: &str, size: RenderSize) -> Result<Vec<u8>> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_render {
            return Err(ServerError::collaborator("rsvg-convert", "exited with code 1"));
        }
        Ok(match size {
            RenderSize::Zoom(_) => fake_png(self.natural.0, self.natural.1),
            RenderSize::Pixels(width, height) => fake_png(width, height),
        })
    }

    async fn fit_to_file(
        &self,
        png: &[u8],
        path: &Path,
        _width: u32,
        _height: u32,
        _center: bool,
    ) -> Result<()> {
        self.fit_calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(path, png)
            .map_err(|err| ServerError::collaborator("magick", err.to_string()))
    }
}
