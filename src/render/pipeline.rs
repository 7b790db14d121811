//! Render orchestration for one request.
//!
//! The pipeline owns both cache levels and the artifact lifecycle. A request
//! flows through: empty check, artifact-cache lookup, memoized typesetting,
//! color substitution, size resolution, rasterization, persistence. Every
//! recoverable failure becomes an `error` response tied to the request
//! identifier; the pipeline never takes the process down.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::errors::{Result, ServerError};
use crate::protocol::{RenderRequest, Response};
use crate::raster::{self, RasterBackend, RenderSize};
use crate::render::artifacts::ArtifactLifecycle;
use crate::render::cache::{Artifact, CacheKey, EquationCache, TypesetEntry};
use crate::render::sizing::{self, ResolvedSize};
use crate::typeset::Typesetter;

pub struct RenderPipeline<T, R> {
    typesetter: T,
    raster: R,
    cache: EquationCache,
    artifacts: ArtifactLifecycle,
}

impl<T: Typesetter, R: RasterBackend> RenderPipeline<T, R> {
    pub fn new(typesetter: T, raster: R, artifacts: ArtifactLifecycle) -> Self {
        Self {
            typesetter,
            raster,
            cache: EquationCache::default(),
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &ArtifactLifecycle {
        &self.artifacts
    }

    /// Handles one render request, converting recoverable errors into
    /// `error` responses.
    pub async fn handle(&mut self, request: &RenderRequest, config: &SessionConfig) -> Response {
        match self.render(request, config).await {
            Ok(response) => response,
            Err(err) => {
                debug!(identifier = %request.identifier, %err, "render failed");
                Response::error(&request.identifier, err.to_string())
            }
        }
    }

    /// Removes all artifacts and the scratch directory. Called once at
    /// process teardown.
    pub fn cleanup(&mut self) {
        self.artifacts.cleanup();
    }

    async fn render(
        &mut self,
        request: &RenderRequest,
        config: &SessionConfig,
    ) -> Result<Response> {
        if request.source.trim().is_empty() {
            return Err(ServerError::EmptyEquation);
        }

        let key = CacheKey::for_request(request);
        if let Some(artifact) = self.cache.artifact(&key) {
            debug!(identifier = %request.identifier, path = %artifact.path.display(), "artifact cache hit");
            return Ok(success(&request.identifier, artifact));
        }

        let markup = match self.typeset_cached(&request.source).await? {
            TypesetEntry::Markup(svg) => svg,
            TypesetEntry::Failed(message) => return Err(ServerError::Typeset(message)),
        };

        let svg = apply_color(&markup, config.effective_color(&request.color));

        // Dynamic sizing probes the natural dimensions first; the static
        // path renders straight at the requested pixel size.
        let (resolved, base_png) = if request.flags.dynamic() {
            let zoom = sizing::probe_zoom(config, request.cell_height);
            let probe = self.raster.render_svg(&svg, RenderSize::Zoom(zoom)).await?;
            let natural = raster::png_dimensions(&probe)?;
            let resolved = sizing::fit_to_cells(natural, request, config);
            (resolved, probe)
        } else {
            let resolved = sizing::fixed_size(request, config);
            let png = self
                .raster
                .render_svg(
                    &svg,
                    RenderSize::Pixels(resolved.pixel_width, resolved.pixel_height),
                )
                .await?;
            (resolved, png)
        };

        let artifact = self.persist(request, resolved, &base_png).await?;
        let response = success(&request.identifier, &artifact);
        self.cache.record_artifact(key, artifact);
        Ok(response)
    }

    async fn persist(
        &mut self,
        request: &RenderRequest,
        resolved: ResolvedSize,
        base_png: &[u8],
    ) -> Result<Artifact> {
        let path =
            self.artifacts
                .artifact_path(&request.source, resolved.pixel_width, resolved.pixel_height);

        self.raster
            .fit_to_file(
                base_png,
                &path,
                resolved.pixel_width,
                resolved.pixel_height,
                request.flags.center(),
            )
            .await?;

        self.artifacts.record(path.clone());
        debug!(
            path = %path.display(),
            cells = format!("{}x{}", resolved.cells_width, resolved.cells_height),
            "artifact written"
        );

        Ok(Artifact {
            source: request.source.clone(),
            path,
            width: resolved.cells_width,
            height: resolved.cells_height,
        })
    }

    /// Typesets through the memoization layer. Negative results are cached;
    /// system failures propagate uncached so a transient collaborator
    /// problem doesn't poison the equation forever.
    async fn typeset_cached(&mut self, source: &str) -> Result<TypesetEntry> {
        if let Some(entry) = self.cache.typeset_entry(source) {
            return Ok(entry.clone());
        }

        let entry = match self.typesetter.typeset(source).await {
            Ok(svg) => TypesetEntry::Markup(svg),
            Err(ServerError::Typeset(message)) => {
                warn!(%message, "equation rejected by typesetter");
                TypesetEntry::Failed(message)
            }
            Err(other) => return Err(other),
        };

        self.cache.record_typeset(source.to_string(), entry.clone());
        Ok(entry)
    }
}

fn success(identifier: &str, artifact: &Artifact) -> Response {
    Response::Image {
        identifier: identifier.to_string(),
        width: artifact.width,
        height: artifact.height,
        path: artifact.path.to_string_lossy().into_owned(),
    }
}

/// Substitutes the foreground color for the markup's `currentColor`
/// placeholder and strips the first embedded style attribute, which would
/// otherwise override it.
fn apply_color(markup: &str, color: &str) -> String {
    let recolored = markup.replace("currentColor", color);
    style_pattern().replace(&recolored, "").into_owned()
}

#[allow(clippy::expect_used)]
fn style_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"style="[^"]+""#).expect("valid style pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_substitution_replaces_every_placeholder() {
        let svg = r#"<svg><g fill="currentColor"><path stroke="currentColor"/></g></svg>"#;
        let out = apply_color(svg, "#ff8800");
        assert!(!out.contains("currentColor"));
        assert_eq!(out.matches("#ff8800").count(), 2);
    }

    #[test]
    fn only_the_first_style_attribute_is_stripped() {
        let svg = r#"<svg style="color: black"><g style="font: serif"/></svg>"#;
        let out = apply_color(svg, "#ffffff");
        assert!(!out.contains("color: black"));
        assert!(out.contains("font: serif"));
    }
}
