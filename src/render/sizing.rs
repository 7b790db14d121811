//! Dynamic size resolution.
//!
//! When a request enables dynamic sizing, the pipeline renders a probe image
//! at a zoom proportional to the configured scales and the cell height,
//! reads its natural pixel dimensions, and grows the requested cell
//! footprint to fit. The caller-supplied footprint is a floor, never
//! replaced: a small natural image keeps the requested footprint and can be
//! recentered inside it.

use crate::config::SessionConfig;
use crate::protocol::RenderRequest;

/// The density semantics of the probe renderer: one density unit is 1/96 of
/// a cell-height-scaled inch.
const PROBE_DENSITY_BASE: f64 = 10.0 / 96.0;

/// Resolved output geometry for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSize {
    /// Footprint in terminal cells
    pub cells_width: u32,
    pub cells_height: u32,
    /// Rasterization target in pixels
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Zoom factor for the dynamic-sizing probe render.
pub fn probe_zoom(config: &SessionConfig, cell_height: u32) -> f64 {
    PROBE_DENSITY_BASE * config.dynamic_scale * f64::from(cell_height) * config.internal_scale
}

/// Fits natural pixel dimensions to a cell grid, honoring the requested
/// footprint as a minimum.
pub fn fit_to_cells(
    natural_px: (u32, u32),
    request: &RenderRequest,
    config: &SessionConfig,
) -> ResolvedSize {
    let (natural_width, natural_height) = natural_px;

    let fit_width =
        (f64::from(natural_width) / config.internal_scale / f64::from(request.cell_width)).ceil();
    let fit_height =
        (f64::from(natural_height) / config.internal_scale / f64::from(request.cell_height)).ceil();

    let cells_width = request.width.max(fit_width as u32);
    let cells_height = request.height.max(fit_height as u32);

    with_pixel_target(cells_width, cells_height, request, config)
}

/// Geometry when dynamic sizing is disabled: the requested footprint is used
/// as-is.
pub fn fixed_size(request: &RenderRequest, config: &SessionConfig) -> ResolvedSize {
    with_pixel_target(request.width, request.height, request, config)
}

fn with_pixel_target(
    cells_width: u32,
    cells_height: u32,
    request: &RenderRequest,
    config: &SessionConfig,
) -> ResolvedSize {
    let pixel_width =
        (f64::from(cells_width) * f64::from(request.cell_width) * config.internal_scale).round();
    let pixel_height =
        (f64::from(cells_height) * f64::from(request.cell_height) * config.internal_scale).round();

    ResolvedSize {
        cells_width,
        cells_height,
        pixel_width: pixel_width as u32,
        pixel_height: pixel_height as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RenderFlags;

    fn request(width: u32, height: u32, cell_width: u32, cell_height: u32) -> RenderRequest {
        RenderRequest {
            identifier: "t".to_string(),
            source: "x".to_string(),
            cell_width,
            cell_height,
            width,
            height,
            flags: RenderFlags::new(1),
            color: "#ffffff".to_string(),
        }
    }

    #[test]
    fn small_natural_image_keeps_the_requested_floor() {
        let config = SessionConfig::default();
        let req = request(4, 2, 10, 20);
        // Natural size fits well inside the requested 4x2 cells.
        let resolved = fit_to_cells((15, 18), &req, &config);
        assert_eq!(resolved.cells_width, 4);
        assert_eq!(resolved.cells_height, 2);
        assert_eq!(resolved.pixel_width, 40);
        assert_eq!(resolved.pixel_height, 40);
    }

    #[test]
    fn large_natural_image_grows_the_footprint() {
        let config = SessionConfig::default();
        let req = request(4, 2, 10, 20);
        // 95px wide at 10px cells -> ceil(9.5) = 10 cells.
        let resolved = fit_to_cells((95, 70), &req, &config);
        assert_eq!(resolved.cells_width, 10);
        assert_eq!(resolved.cells_height, 4);
        assert_eq!(resolved.pixel_width, 100);
        assert_eq!(resolved.pixel_height, 80);
    }

    #[test]
    fn internal_scale_shrinks_the_cell_fit_and_grows_the_pixel_target() {
        let mut config = SessionConfig::default();
        config.internal_scale = 2.0;
        let req = request(1, 1, 10, 20);
        // 60px at 2x internal scale is 30 logical px -> 3 cells of 10px.
        let resolved = fit_to_cells((60, 20), &req, &config);
        assert_eq!(resolved.cells_width, 3);
        assert_eq!(resolved.cells_height, 1);
        // Pixel target folds the scale back in.
        assert_eq!(resolved.pixel_width, 60);
        assert_eq!(resolved.pixel_height, 40);
    }

    #[test]
    fn fixed_size_skips_the_probe_arithmetic() {
        let config = SessionConfig::default();
        let req = request(4, 2, 10, 20);
        let resolved = fixed_size(&req, &config);
        assert_eq!(resolved.cells_width, 4);
        assert_eq!(resolved.cells_height, 2);
        assert_eq!(resolved.pixel_width, 40);
        assert_eq!(resolved.pixel_height, 40);
    }

    #[test]
    fn probe_zoom_scales_with_cell_height_and_both_factors() {
        let mut config = SessionConfig::default();
        assert!((probe_zoom(&config, 96) - 10.0).abs() < 1e-9);

        config.dynamic_scale = 2.0;
        config.internal_scale = 3.0;
        assert!((probe_zoom(&config, 48) - 30.0).abs() < 1e-9);
    }
}
