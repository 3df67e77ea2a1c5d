//! Chunk cropping: per-capture geometry in raw snapshot pixel space.
//!
//! Overlay sizes arrive in CSS pixels and are scaled by the device pixel
//! ratio to match the raw snapshot. The first chunk keeps the top overlay
//! (it has not been shown yet), middle chunks keep only the band that is new
//! since the previous scroll position, and the last chunk keeps everything
//! not yet captured because the remaining distance may be less than a full
//! step. The bottom overlay is always cropped.

use image::{imageops, load_from_memory};
use log::warn;

use crate::metrics::OverlayMetrics;
use crate::stitch::encode_png;

/// One cropped viewport capture: a unique vertical slice of the full page.
///
/// Immutable after creation and owned by the capture session until it is
/// handed to the stitcher. Chunks are stitched strictly in `index` order.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// PNG-encoded pixels of the cropped strip
    pub png: Vec<u8>,
    /// Width in raw snapshot pixels (0 when the raw-bytes fallback was taken)
    pub width: u32,
    /// Height in raw snapshot pixels (0 when the raw-bytes fallback was taken)
    pub height: u32,
    /// Capture order, starting at 0
    pub index: usize,
    /// Whether this is the first chunk of the session
    pub is_first: bool,
    /// Whether this chunk was cropped with the last-chunk rule
    pub is_last: bool,
}

/// Position of a capture within the session, selecting the crop rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkPosition {
    /// First capture of a scrollable page
    First,
    /// Any capture between the first and the last
    Middle,
    /// Final capture, taken at the scroll ceiling
    Last,
    /// Sole capture of an unscrollable page
    Only,
}

impl ChunkPosition {
    #[inline]
    #[must_use]
    pub const fn is_first(self) -> bool {
        matches!(self, Self::First | Self::Only)
    }

    #[inline]
    #[must_use]
    pub const fn is_last(self) -> bool {
        matches!(self, Self::Last | Self::Only)
    }
}

/// Sub-rectangle of a raw snapshot to keep, in snapshot pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRegion {
    /// Top edge of the kept band
    pub y: u32,
    /// Height of the kept band, always at least 1
    pub height: u32,
}

/// Compute the band of a raw snapshot to keep for a chunk.
///
/// `scroll_delta_css` is how far the page actually scrolled since the
/// previous capture, in CSS pixels; it is ignored for first/only chunks.
/// A non-positive computed height clamps to 1px: a visible artifact is
/// preferred over a zero-area image.
#[must_use]
pub fn crop_region(
    raw_height: u32,
    metrics: &OverlayMetrics,
    position: ChunkPosition,
    scroll_delta_css: f64,
) -> CropRegion {
    let dpr = metrics.device_pixel_ratio;
    let top_px = (f64::from(metrics.top_overlay) * dpr).round() as u32;
    let bottom_px = (f64::from(metrics.bottom_overlay) * dpr).round() as u32;
    let scrolled_px = (scroll_delta_css.max(0.0) * dpr).round() as u32;

    let (y, height) = match position {
        // Keep the top overlay once; it has not been shown yet.
        ChunkPosition::First | ChunkPosition::Only => {
            (0, raw_height.saturating_sub(bottom_px))
        }
        // Keep only the band that is new since the previous scroll position.
        ChunkPosition::Middle => {
            let visible_px = raw_height.saturating_sub(top_px.saturating_add(bottom_px));
            (
                top_px.saturating_add(visible_px.saturating_sub(scrolled_px)),
                scrolled_px,
            )
        }
        // Keep everything not yet captured down to the bottom overlay.
        ChunkPosition::Last => {
            let y = top_px.saturating_add(scrolled_px);
            (y, raw_height.saturating_sub(bottom_px).saturating_sub(y))
        }
    };

    let y = y.min(raw_height.saturating_sub(1));
    let height = height.max(1).min(raw_height - y);
    CropRegion { y, height }
}

/// Crop a raw viewport snapshot into a [`Chunk`].
///
/// If the snapshot fails to decode, the raw uncropped bytes are kept instead
/// of discarding the capture; overlay removal is sacrificed but the data
/// survives for stitching.
#[must_use]
pub fn crop_chunk(
    raw_png: &[u8],
    metrics: &OverlayMetrics,
    position: ChunkPosition,
    scroll_delta_css: f64,
    index: usize,
) -> Chunk {
    let fallback = |reason: &dyn core::fmt::Display| {
        warn!("chunk #{index}: keeping raw snapshot, crop skipped: {reason}");
        Chunk {
            png: raw_png.to_vec(),
            width: 0,
            height: 0,
            index,
            is_first: position.is_first(),
            is_last: position.is_last(),
        }
    };

    let decoded = match load_from_memory(raw_png) {
        Ok(decoded) => decoded,
        Err(err) => return fallback(&err),
    };

    let mut rgba = decoded.to_rgba8();
    let region = crop_region(rgba.height(), metrics, position, scroll_delta_css);
    let width = rgba.width();
    let cropped = imageops::crop(&mut rgba, 0, region.y, width, region.height).to_image();

    match encode_png(&cropped) {
        Ok(png) => Chunk {
            png,
            width: cropped.width(),
            height: cropped.height(),
            index,
            is_first: position.is_first(),
            is_last: position.is_last(),
        },
        Err(err) => fallback(&err),
    }
}
