//! Per-face thumbnail extraction.
//!
//! Crops the source image to a pixel region and re-encodes the crop as
//! JPEG. Pure transformation; callers upload the result to the object
//! store.

use crate::types::PixelRegion;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("source image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),
    #[error("region {region:?} exceeds decoded image bounds {width}x{height}")]
    InvalidRegion {
        region: PixelRegion,
        width: u32,
        height: u32,
    },
    #[error("thumbnail encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// Crop `image_bytes` to `region` and encode the crop as JPEG.
///
/// The region is re-checked against the *decoded* dimensions: regions are
/// derived from caller-supplied image dimensions, which can disagree with
/// the actual bitmap.
pub fn extract_thumbnail(
    image_bytes: &[u8],
    region: &PixelRegion,
) -> Result<Vec<u8>, ThumbnailError> {
    let source = image::load_from_memory(image_bytes).map_err(ThumbnailError::Decode)?;

    let (width, height) = (source.width(), source.height());
    let in_bounds = region.width >= 1
        && region.height >= 1
        && region
            .left
            .checked_add(region.width)
            .is_some_and(|right| right <= width)
        && region
            .top
            .checked_add(region.height)
            .is_some_and(|bottom| bottom <= height);
    if !in_bounds {
        return Err(ThumbnailError::InvalidRegion {
            region: *region,
            width,
            height,
        });
    }

    // JPEG has no alpha channel; flatten to RGB before encoding.
    let crop = source
        .crop_imm(region.left, region.top, region.width, region.height)
        .to_rgb8();

    let mut encoded = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(crop)
        .write_to(&mut encoded, image::ImageFormat::Jpeg)
        .map_err(ThumbnailError::Encode)?;

    Ok(encoded.into_inner())
}
