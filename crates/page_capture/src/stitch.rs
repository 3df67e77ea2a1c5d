//! Vertical composition of captured chunks into one tall image.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder as _, RgbaImage, imageops, load_from_memory};
use log::{info, warn};

use crate::chunk::Chunk;
use crate::error::StitchError;

/// Concatenate chunks vertically, in capture order, into one image.
///
/// Each chunk is decoded individually; a chunk that fails to decode is
/// skipped with a warning rather than aborting the whole composition. The
/// canvas takes the first valid chunk's width (chunks are assumed equal
/// width, no mismatch correction is performed) and the sum of valid chunk
/// heights.
///
/// # Errors
///
/// Returns [`StitchError::NoValidChunks`] if no chunk decodes successfully.
pub fn stitch(chunks: &[Chunk]) -> Result<RgbaImage, StitchError> {
    let mut decoded = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match load_from_memory(&chunk.png) {
            Ok(image) => decoded.push(image.to_rgba8()),
            Err(err) => warn!("skipping chunk #{} during stitch: {err}", chunk.index),
        }
    }

    let Some(first) = decoded.first() else {
        return Err(StitchError::NoValidChunks);
    };

    let width = first.width();
    let total_height: u32 = decoded.iter().map(RgbaImage::height).sum();
    info!(
        "stitching {} of {} chunks into {width}x{total_height}",
        decoded.len(),
        chunks.len()
    );

    let mut canvas = RgbaImage::new(width, total_height);
    let mut offset_y = 0i64;
    for strip in &decoded {
        imageops::replace(&mut canvas, strip, 0, offset_y);
        offset_y += i64::from(strip.height());
    }
    Ok(canvas)
}

/// Serialize an image losslessly to PNG bytes.
///
/// # Errors
///
/// Returns an error if PNG encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8.into(),
    )?;
    Ok(buf)
}
