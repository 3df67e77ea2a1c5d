//! Overlay metrics: detection of screen-fixed chrome and scroll geometry.
//!
//! Fixed and sticky headers/footers re-render identically at every scroll
//! position, so every chunk except the edge chunks must exclude them or the
//! stitched output shows duplicated bands. The probe runs inside the page,
//! measures every rendered element, and reports the maximum viewport coverage
//! claimed by overlays at each edge.

use serde::Deserialize;

/// Layout measurements taken inside the page before a capture.
///
/// All fields are in CSS pixels; raw snapshot pixels are obtained by scaling
/// with [`device_pixel_ratio`](Self::device_pixel_ratio). Overlay height can
/// change as content loads, so metrics are recomputed before every capture.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayMetrics {
    /// Height of screen-fixed chrome hugging the viewport top
    pub top_overlay: u32,
    /// Height of screen-fixed chrome hugging the viewport bottom
    pub bottom_overlay: u32,
    /// Inner viewport height
    pub viewport_height: u32,
    /// Maximum scroll offset, `max(scrollHeight - viewportHeight, 0)`
    pub max_scroll_top: f64,
    /// Device pixel ratio of the capturing display
    #[serde(rename = "dpr")]
    pub device_pixel_ratio: f64,
}

impl OverlayMetrics {
    /// Scroll step in CSS pixels: the visible band not covered by overlays.
    ///
    /// Consecutive chunks scroll by exactly this much, so they are contiguous
    /// with no gap and minimal overlap. Degenerate overlays (covering the whole
    /// viewport) clamp the step to 1px rather than stalling the loop.
    #[must_use]
    pub fn scroll_step(&self) -> u32 {
        self.viewport_height
            .saturating_sub(self.top_overlay.saturating_add(self.bottom_overlay))
            .max(1)
    }

    /// Whether the page carries no overlay at either edge.
    #[inline]
    #[must_use]
    pub const fn overlay_free(&self) -> bool {
        self.top_overlay == 0 && self.bottom_overlay == 0
    }

    /// Whether the page cannot scroll at all.
    #[inline]
    #[must_use]
    pub fn unscrollable(&self) -> bool {
        self.max_scroll_top <= 0.0
    }
}

/// In-page probe measuring overlays and scroll geometry.
///
/// Walks every rendered element; an element counts as an overlay when its
/// computed position is fixed or sticky, it is not hidden, it intersects the
/// viewport, and its edge sits within the tolerance of the matching viewport
/// edge. Overlapping overlays at the same edge take the maximum coverage, not
/// the sum. Elements whose style computation throws (cross-origin frames and
/// similar) are skipped so one restricted element never aborts the scan.
const OVERLAY_PROBE_SCRIPT: &str = r"(function () {
    var vh = window.innerHeight;
    var dpr = window.devicePixelRatio || 1;
    var tolerance = __EDGE_TOLERANCE__;
    var topOverlay = 0, bottomOverlay = 0;
    var all = document.querySelectorAll('*');
    for (var i = 0; i < all.length; i++) {
        try {
            var style = getComputedStyle(all[i]);
            var pos = style.position;
            if (pos !== 'fixed' && pos !== 'sticky') continue;
            if (style.display === 'none' || style.visibility === 'hidden') continue;
            var r = all[i].getBoundingClientRect();
            if (!r.width || !r.height) continue;
            if (r.right <= 0 || r.left >= window.innerWidth) continue;
            if (r.bottom <= 0 || r.top >= vh) continue;
            if (r.top <= tolerance) {
                topOverlay = Math.max(topOverlay, Math.ceil(r.bottom));
            }
            if (r.bottom >= vh - tolerance) {
                bottomOverlay = Math.max(bottomOverlay, Math.ceil(vh - r.top));
            }
        } catch (e) {}
    }
    var maxScrollTop = Math.max(document.documentElement.scrollHeight - vh, 0);
    return JSON.stringify({
        topOverlay: topOverlay,
        bottomOverlay: bottomOverlay,
        viewportHeight: vh,
        maxScrollTop: maxScrollTop,
        dpr: dpr
    });
})()";

/// In-page scroll script: clamps to the scroll ceiling and reports the result.
///
/// The ceiling is recomputed on every call rather than cached, so pages whose
/// content grows while scrolling keep reporting an honest maximum.
const SCROLL_SCRIPT: &str = r"(function () {
    var vh = window.innerHeight;
    var max = Math.max(document.documentElement.scrollHeight - vh, 0);
    var y = Math.min(window.scrollY + __STEP__, max);
    window.scrollTo({ top: y, behavior: 'auto' });
    return JSON.stringify({ newY: y, maxScrollTop: max });
})()";

/// Render the overlay probe script with the configured edge tolerance.
#[must_use]
pub fn overlay_probe_script(edge_tolerance_px: u32) -> String {
    OVERLAY_PROBE_SCRIPT.replace("__EDGE_TOLERANCE__", &edge_tolerance_px.to_string())
}

/// Render the scroll script for a step in CSS pixels.
#[must_use]
pub fn scroll_script(step_css_px: f64) -> String {
    SCROLL_SCRIPT.replace("__STEP__", &format!("{step_css_px}"))
}

#[cfg(test)]
mod tests {
    use super::{OverlayMetrics, overlay_probe_script, scroll_script};

    fn metrics(top: u32, bottom: u32, viewport: u32) -> OverlayMetrics {
        OverlayMetrics {
            top_overlay: top,
            bottom_overlay: bottom,
            viewport_height: viewport,
            max_scroll_top: 1000.0,
            device_pixel_ratio: 1.0,
        }
    }

    #[test]
    fn scroll_step_is_visible_band_height() {
        assert_eq!(metrics(50, 30, 800).scroll_step(), 720);
        assert_eq!(metrics(0, 0, 800).scroll_step(), 800);
    }

    #[test]
    fn scroll_step_clamps_degenerate_overlays_to_one() {
        assert_eq!(metrics(500, 400, 800).scroll_step(), 1);
        assert_eq!(metrics(800, 0, 800).scroll_step(), 1);
    }

    #[test]
    fn probe_payload_parses_through_typed_contract() {
        let payload = r#"{"topOverlay":64,"bottomOverlay":48,"viewportHeight":900,"maxScrollTop":4140.5,"dpr":2.0}"#;
        let parsed: OverlayMetrics = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.top_overlay, 64);
        assert_eq!(parsed.bottom_overlay, 48);
        assert_eq!(parsed.viewport_height, 900);
        assert!((parsed.max_scroll_top - 4140.5).abs() < f64::EPSILON);
        assert!((parsed.device_pixel_ratio - 2.0).abs() < f64::EPSILON);

        // Same payload parses to identical metrics.
        let reparsed: OverlayMetrics = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn probe_script_interpolates_tolerance() {
        let script = overlay_probe_script(10);
        assert!(script.contains("var tolerance = 10;"));
        assert!(!script.contains("__EDGE_TOLERANCE__"));
    }

    #[test]
    fn scroll_script_interpolates_step() {
        let script = scroll_script(720.0);
        assert!(script.contains("window.scrollY + 720"));
        assert!(!script.contains("__STEP__"));
    }

    #[test]
    fn unscrollable_page_is_detected() {
        let mut m = metrics(0, 0, 800);
        m.max_scroll_top = 0.0;
        assert!(m.unscrollable());
    }
}
