//! The typed seam between the capture loop and the page context.
//!
//! Measurement and scrolling are cross-context remote calls into the page;
//! rather than shipping inline code around, the loop speaks this small RPC
//! contract and the driver owns the scripts and the transport. Tests exercise
//! the whole pipeline through a scripted in-memory driver.

use serde::Deserialize;

use crate::error::CaptureError;
use crate::metrics::OverlayMetrics;

/// Result of a clamped scroll: the new absolute offset and the ceiling.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPosition {
    /// Absolute scroll offset after the scroll, in CSS pixels
    pub new_y: f64,
    /// Maximum scroll offset, recomputed on every call
    pub max_scroll_top: f64,
}

/// Handle to a live page: measurement, scrolling, and viewport snapshots.
///
/// The viewport is a shared single-valued resource, so callers must never
/// issue overlapping calls; the capture session drives the methods strictly
/// sequentially.
pub trait PageDriver {
    /// Measure overlays and scroll geometry inside the page.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe script cannot run or its payload does not
    /// match the typed contract.
    async fn overlay_metrics(&self) -> Result<OverlayMetrics, CaptureError>;

    /// Scroll down by `step_css_px`, clamped to the page's scroll ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if the scroll script cannot run inside the page.
    async fn scroll_by(&self, step_css_px: f64) -> Result<ScrollPosition, CaptureError>;

    /// Capture the currently visible viewport as lossless PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser denies or cannot produce a snapshot.
    async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError>;
}
