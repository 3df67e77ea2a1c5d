//! Capture session: the control loop driving detect, capture, crop, scroll.
//!
//! One session owns the chunk accumulator and the scroll state for its whole
//! lifetime; every step runs strictly sequentially on one logical task, since
//! the browser viewport is a shared single-valued resource and overlapping
//! captures or scrolls would corrupt chunk ordering. Concurrent triggers are
//! rejected through [`SessionGuard`].

use core::sync::atomic::{AtomicBool, Ordering};
use log::{info, warn};
use tokio::time::sleep;

use crate::chunk::{Chunk, ChunkPosition, crop_chunk};
use crate::config::CaptureConfig;
use crate::driver::PageDriver;
use crate::error::CaptureError;
use crate::metrics::OverlayMetrics;

/// Re-entrancy guard for session starts.
///
/// A second trigger while a session is in flight must not touch the live
/// session state; it fails fast with [`CaptureError::SessionBusy`] instead.
#[derive(Debug, Default)]
pub struct SessionGuard {
    busy: AtomicBool,
}

impl SessionGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Try to mark a session as in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::SessionBusy`] if a permit is already held.
    pub fn try_acquire(&self) -> Result<SessionPermit<'_>, CaptureError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(CaptureError::SessionBusy);
        }
        Ok(SessionPermit { guard: self })
    }
}

/// Held while a session is in flight; released on drop.
#[derive(Debug)]
pub struct SessionPermit<'guard> {
    guard: &'guard SessionGuard,
}

impl Drop for SessionPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

/// Scroll bookkeeping between captures, discarded with the session.
#[derive(Clone, Copy, Debug, Default)]
struct ScrollState {
    current_y: f64,
    previous_y: f64,
    max_scroll_top: f64,
}

/// One capture session, manual or automatic.
///
/// Manual mode calls [`begin`](Self::begin), then [`advance`](Self::advance)
/// per user trigger, then [`finish`](Self::finish). Automatic mode calls
/// [`run_full_page`](Self::run_full_page), which performs the same cycle
/// unattended until the page bottom is reached.
///
/// On a capture or script failure the session aborts mid-loop, but the
/// chunks gathered so far stay readable through [`chunks`](Self::chunks) so
/// callers can inspect or retry rather than losing the work.
#[derive(Debug)]
pub struct CaptureSession {
    config: CaptureConfig,
    chunks: Vec<Chunk>,
    last_metrics: Option<OverlayMetrics>,
    scroll: ScrollState,
    bottom_reached: bool,
}

impl CaptureSession {
    #[must_use]
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            last_metrics: None,
            scroll: ScrollState::default(),
            bottom_reached: false,
        }
    }

    /// Chunks captured so far, in capture order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Metrics from the most recent detection pass.
    #[must_use]
    pub const fn last_metrics(&self) -> Option<&OverlayMetrics> {
        self.last_metrics.as_ref()
    }

    /// Whether the scroll ceiling has been reached.
    #[must_use]
    pub const fn bottom_reached(&self) -> bool {
        self.bottom_reached
    }

    /// Capture the first chunk.
    ///
    /// Waits the first-capture settle delay, measures overlays, and captures
    /// with the first-chunk crop rule. An unscrollable page terminates here:
    /// its sole chunk is both first and last.
    ///
    /// # Errors
    ///
    /// Returns an error if measurement or capture fails.
    pub async fn begin<D: PageDriver>(&mut self, driver: &D) -> Result<(), CaptureError> {
        sleep(self.config.first_settle()).await;

        let metrics = driver.overlay_metrics().await?;
        info!(
            "starting capture: viewport {}px, overlays top {}px / bottom {}px, ceiling {}px",
            metrics.viewport_height,
            metrics.top_overlay,
            metrics.bottom_overlay,
            metrics.max_scroll_top
        );

        let position = if metrics.unscrollable() {
            ChunkPosition::Only
        } else {
            ChunkPosition::First
        };

        let raw = driver.capture_viewport().await?;
        let chunk = crop_chunk(&raw, &metrics, position, 0.0, self.chunks.len());
        info!("captured chunk #{} ({}x{})", chunk.index, chunk.width, chunk.height);

        self.scroll = ScrollState {
            current_y: 0.0,
            previous_y: 0.0,
            max_scroll_top: metrics.max_scroll_top,
        };
        self.bottom_reached = metrics.unscrollable();
        self.last_metrics = Some(metrics);
        self.chunks.push(chunk);
        Ok(())
    }

    /// Scroll one step and capture the next chunk.
    ///
    /// The step is the visible non-overlay band height from the previous
    /// detection pass. After the scroll settles, overlays are re-measured
    /// (they can change as content loads) and the chunk is cropped with the
    /// middle-chunk rule, or the last-chunk rule when the scroll offset no
    /// longer advances or hits the ceiling.
    ///
    /// Returns `true` once the page bottom has been reached.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::SessionNotStarted`] before [`begin`](Self::begin),
    /// or any scroll/measure/capture failure.
    pub async fn advance<D: PageDriver>(&mut self, driver: &D) -> Result<bool, CaptureError> {
        let Some(last_metrics) = self.last_metrics else {
            return Err(CaptureError::SessionNotStarted);
        };
        if self.bottom_reached {
            return Ok(true);
        }

        let step = last_metrics.scroll_step();
        let position = driver.scroll_by(f64::from(step)).await?;
        let delta = (position.new_y - self.scroll.current_y).max(0.0);
        let is_last =
            position.new_y <= self.scroll.current_y || position.new_y >= position.max_scroll_top;

        sleep(self.config.settle()).await;

        let metrics = driver.overlay_metrics().await?;
        let raw = driver.capture_viewport().await?;
        let chunk = crop_chunk(
            &raw,
            &metrics,
            if is_last {
                ChunkPosition::Last
            } else {
                ChunkPosition::Middle
            },
            delta,
            self.chunks.len(),
        );
        self.scroll = ScrollState {
            current_y: position.new_y,
            previous_y: self.scroll.current_y,
            max_scroll_top: position.max_scroll_top,
        };
        info!(
            "captured chunk #{} at {:.0} of {:.0} (scrolled from {:.0})",
            chunk.index, self.scroll.current_y, self.scroll.max_scroll_top, self.scroll.previous_y
        );
        self.bottom_reached = is_last;
        self.last_metrics = Some(metrics);
        self.chunks.push(chunk);
        Ok(is_last)
    }

    /// Run the full cycle unattended until the page bottom is reached.
    ///
    /// # Errors
    ///
    /// Returns the first capture or script failure; chunks captured before
    /// the failure remain on the session.
    pub async fn run_full_page<D: PageDriver>(&mut self, driver: &D) -> Result<(), CaptureError> {
        self.begin(driver).await?;
        while !self.bottom_reached {
            if self.chunks.len() >= self.config.max_chunks {
                warn!(
                    "stopping after {} chunks: page keeps growing past the configured bound",
                    self.chunks.len()
                );
                break;
            }
            self.advance(driver).await?;
        }
        Ok(())
    }

    /// End the session and hand the accumulated chunks to the stitcher.
    #[must_use]
    pub fn finish(self) -> Vec<Chunk> {
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::{CaptureSession, SessionGuard};
    use crate::chunk::ChunkPosition;
    use crate::config::CaptureConfig;
    use crate::driver::{PageDriver, ScrollPosition};
    use crate::error::CaptureError;
    use crate::metrics::OverlayMetrics;
    use crate::stitch::{encode_png, stitch};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Scripted page standing in for a live browser tab.
    struct FakePage {
        state: Mutex<FakeState>,
    }

    struct FakeState {
        scroll_y: f64,
        page_height: f64,
        viewport_height: u32,
        top_overlay: u32,
        bottom_overlay: u32,
        captures_before_failure: Option<usize>,
        captures: usize,
    }

    impl FakePage {
        fn new(page_height: f64, viewport_height: u32, top: u32, bottom: u32) -> Self {
            Self {
                state: Mutex::new(FakeState {
                    scroll_y: 0.0,
                    page_height,
                    viewport_height,
                    top_overlay: top,
                    bottom_overlay: bottom,
                    captures_before_failure: None,
                    captures: 0,
                }),
            }
        }

        fn failing_after(self, captures: usize) -> Self {
            self.state.lock().unwrap().captures_before_failure = Some(captures);
            self
        }

        fn scroll_y(&self) -> f64 {
            self.state.lock().unwrap().scroll_y
        }
    }

    impl PageDriver for FakePage {
        async fn overlay_metrics(&self) -> Result<OverlayMetrics, CaptureError> {
            let state = self.state.lock().unwrap();
            Ok(OverlayMetrics {
                top_overlay: state.top_overlay,
                bottom_overlay: state.bottom_overlay,
                viewport_height: state.viewport_height,
                max_scroll_top: (state.page_height - f64::from(state.viewport_height)).max(0.0),
                device_pixel_ratio: 1.0,
            })
        }

        async fn scroll_by(&self, step_css_px: f64) -> Result<ScrollPosition, CaptureError> {
            let mut state = self.state.lock().unwrap();
            let max = (state.page_height - f64::from(state.viewport_height)).max(0.0);
            state.scroll_y = (state.scroll_y + step_css_px).min(max);
            Ok(ScrollPosition {
                new_y: state.scroll_y,
                max_scroll_top: max,
            })
        }

        async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError> {
            let mut state = self.state.lock().unwrap();
            if let Some(limit) = state.captures_before_failure
                && state.captures >= limit
            {
                return Err(CaptureError::Screenshot("rate limited".to_string()));
            }
            state.captures += 1;
            let image = RgbaImage::from_pixel(
                320,
                state.viewport_height,
                Rgba([state.captures as u8, 0, 0, 255]),
            );
            encode_png(&image).map_err(|err| CaptureError::Screenshot(err.to_string()))
        }
    }

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            settle_ms: 0,
            first_settle_ms: 0,
            ..CaptureConfig::default()
        }
    }

    #[tokio::test]
    async fn full_page_run_terminates_and_orders_chunks() {
        // 2000px page, 800px viewport, no overlays: first chunk at 0, then
        // scrolls of 800 to 800 and 1200 (the ceiling).
        let page = FakePage::new(2000.0, 800, 0, 0);
        let mut session = CaptureSession::new(test_config());
        session.run_full_page(&page).await.unwrap();

        let chunks = session.finish();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].is_first && !chunks[0].is_last);
        assert!(!chunks[1].is_first && !chunks[1].is_last);
        assert!(chunks[2].is_last);
        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
        // First chunk is the whole viewport; middle is the 800px scroll band;
        // last is the remaining 400px.
        assert_eq!(chunks[0].height, 800);
        assert_eq!(chunks[1].height, 800);
        assert_eq!(chunks[2].height, 400);
    }

    #[tokio::test]
    async fn scroll_offsets_are_monotonic_and_bounded() {
        let page = FakePage::new(5000.0, 600, 40, 0);
        let mut session = CaptureSession::new(test_config());
        session.begin(&page).await.unwrap();

        let mut previous = 0.0;
        loop {
            let done = session.advance(&page).await.unwrap();
            let y = page.scroll_y();
            assert!(y >= previous);
            assert!(y <= 4400.0);
            previous = y;
            if done {
                break;
            }
        }
        assert!(session.bottom_reached());
    }

    #[tokio::test]
    async fn unscrollable_page_captures_exactly_one_chunk() {
        let page = FakePage::new(600.0, 800, 0, 0);
        let mut session = CaptureSession::new(test_config());
        session.run_full_page(&page).await.unwrap();

        let chunks = session.finish();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_first && chunks[0].is_last);
    }

    #[tokio::test]
    async fn capture_failure_aborts_but_preserves_chunks() {
        let page = FakePage::new(3000.0, 800, 0, 0).failing_after(1);
        let mut session = CaptureSession::new(test_config());

        let err = session.run_full_page(&page).await.unwrap_err();
        assert!(matches!(err, CaptureError::Screenshot(_)));
        assert_eq!(session.chunks().len(), 1);
        assert!(session.chunks()[0].is_first);
    }

    #[tokio::test]
    async fn advance_before_begin_is_rejected() {
        let page = FakePage::new(2000.0, 800, 0, 0);
        let mut session = CaptureSession::new(test_config());
        let err = session.advance(&page).await.unwrap_err();
        assert!(matches!(err, CaptureError::SessionNotStarted));
    }

    #[tokio::test]
    async fn stitched_output_matches_session_chunk_heights() {
        let page = FakePage::new(2000.0, 800, 0, 0);
        let mut session = CaptureSession::new(test_config());
        session.run_full_page(&page).await.unwrap();

        let chunks = session.finish();
        let expected: u32 = chunks.iter().map(|chunk| chunk.height).sum();
        let stitched = stitch(&chunks).unwrap();
        assert_eq!(stitched.height(), expected);
        assert_eq!(stitched.width(), chunks[0].width);
    }

    #[tokio::test]
    async fn overlays_shrink_middle_chunks_to_the_new_band() {
        // 800px viewport with 50/30 overlays: step 720, middle chunks keep
        // exactly the scrolled band.
        let page = FakePage::new(2240.0, 800, 50, 30);
        let mut session = CaptureSession::new(test_config());
        session.run_full_page(&page).await.unwrap();

        let chunks = session.finish();
        assert_eq!(chunks[0].height, 770); // raw 800 minus the bottom overlay
        for chunk in chunks.iter().filter(|chunk| !chunk.is_first && !chunk.is_last) {
            assert_eq!(chunk.height, 720);
        }
    }

    #[test]
    fn guard_rejects_reentrant_start() {
        let guard = SessionGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(matches!(
            guard.try_acquire(),
            Err(CaptureError::SessionBusy)
        ));
        drop(permit);
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn chunk_position_flags() {
        assert!(ChunkPosition::Only.is_first() && ChunkPosition::Only.is_last());
        assert!(ChunkPosition::First.is_first() && !ChunkPosition::First.is_last());
        assert!(!ChunkPosition::Middle.is_first() && !ChunkPosition::Middle.is_last());
        assert!(ChunkPosition::Last.is_last());
    }
}
