//! Geometry resolution: normalized bounding boxes → pixel regions.
//!
//! Pure functions, no side effects. Detectors report box coordinates as
//! fractions of the image; everything downstream works in pixels.

use crate::types::{BoundingBox, PixelRegion};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("bounding box collapses to zero area after clamping")]
    DegenerateRegion,
}

/// Resolve a detector's normalized bounding box into pixel coordinates
/// against the given image size.
///
/// Each scaled coordinate is floored; `left`/`top` are clamped into
/// `[0, dim - 1]` and `width`/`height` so the region stays inside the image.
/// Detectors do emit slightly-negative edges, which clamp to 0. A clamped
/// width or height of zero is [`GeometryError::DegenerateRegion`]; callers
/// skip that face rather than failing the image.
pub fn resolve_region(
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
) -> Result<PixelRegion, GeometryError> {
    if image_width == 0 || image_height == 0 {
        return Err(GeometryError::DegenerateRegion);
    }

    let left = clamp_origin(bbox.left, image_width);
    let top = clamp_origin(bbox.top, image_height);
    let width = clamp_extent(bbox.width, left, image_width);
    let height = clamp_extent(bbox.height, top, image_height);

    if width == 0 || height == 0 {
        return Err(GeometryError::DegenerateRegion);
    }

    Ok(PixelRegion {
        left,
        top,
        width,
        height,
    })
}

/// Floor `fraction * dim`, clamped into `[0, dim - 1]`.
fn clamp_origin(fraction: f32, dim: u32) -> u32 {
    let raw = (f64::from(fraction) * f64::from(dim)).floor() as i64;
    raw.clamp(0, i64::from(dim) - 1) as u32
}

/// Floor `fraction * dim`, clamped so `origin + extent <= dim`.
fn clamp_extent(fraction: f32, origin: u32, dim: u32) -> u32 {
    let raw = (f64::from(fraction) * f64::from(dim)).floor() as i64;
    raw.clamp(0, i64::from(dim) - i64::from(origin)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(left: f32, top: f32, width: f32, height: f32) -> BoundingBox {
        BoundingBox {
            left,
            top,
            width,
            height,
        }
    }

    #[test]
    fn resolves_exact_pixel_region() {
        let region = resolve_region(&bbox(0.1, 0.1, 0.3, 0.3), 100, 100).unwrap();
        assert_eq!(
            region,
            PixelRegion {
                left: 10,
                top: 10,
                width: 30,
                height: 30
            }
        );
    }

    #[test]
    fn floors_fractional_coordinates() {
        // 0.333 * 99 = 32.967 → 32; 0.5 * 99 = 49.5 → 49
        let region = resolve_region(&bbox(0.333, 0.5, 0.333, 0.333), 99, 99).unwrap();
        assert_eq!(region.left, 32);
        assert_eq!(region.top, 49);
        assert_eq!(region.width, 32);
    }

    #[test]
    fn zero_width_box_is_degenerate() {
        let err = resolve_region(&bbox(0.0, 0.0, 0.0, 0.5), 100, 100).unwrap_err();
        assert_eq!(err, GeometryError::DegenerateRegion);
    }

    #[test]
    fn subpixel_box_is_degenerate() {
        // 0.004 * 100 = 0.4 → floors to 0
        assert!(resolve_region(&bbox(0.2, 0.2, 0.004, 0.3), 100, 100).is_err());
    }

    #[test]
    fn negative_edges_clamp_to_zero() {
        let region = resolve_region(&bbox(-0.05, -0.05, 0.3, 0.3), 100, 100).unwrap();
        assert_eq!(region.left, 0);
        assert_eq!(region.top, 0);
        assert_eq!(region.width, 30);
    }

    #[test]
    fn overhanging_box_is_clamped_into_bounds() {
        let region = resolve_region(&bbox(0.9, 0.9, 0.5, 0.5), 100, 100).unwrap();
        assert_eq!(region.left, 90);
        assert_eq!(region.width, 10);
        assert_eq!(region.top, 90);
        assert_eq!(region.height, 10);
    }

    #[test]
    fn zero_sized_image_is_degenerate() {
        assert!(resolve_region(&bbox(0.1, 0.1, 0.5, 0.5), 0, 100).is_err());
    }

    #[test]
    fn resolved_regions_stay_in_bounds() {
        // Sweep a grid of boxes, including ones hanging over every edge.
        let fractions = [-0.2, 0.0, 0.1, 0.33, 0.5, 0.77, 0.95, 1.0, 1.3];
        let dims = [(1, 1), (7, 13), (100, 100), (640, 480), (4032, 3024)];
        for &(w, h) in &dims {
            for &left in &fractions {
                for &top in &fractions {
                    for &bw in &fractions {
                        for &bh in &fractions {
                            if let Ok(region) = resolve_region(&bbox(left, top, bw, bh), w, h) {
                                assert!(region.width >= 1 && region.height >= 1);
                                assert!(region.left + region.width <= w, "{region:?} vs {w}x{h}");
                                assert!(region.top + region.height <= h, "{region:?} vs {w}x{h}");
                            }
                        }
                    }
                }
            }
        }
    }
}
