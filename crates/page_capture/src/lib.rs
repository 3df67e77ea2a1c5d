//! Scroll-capture pipeline for producing one stitched image of a full web page.
//!
//! This crate repeatedly captures the visible browser viewport, crops out
//! screen-fixed chrome (sticky headers and footers), scrolls the page by the
//! visible band height, and finally composites the captured strips into one
//! tall raster. The browser itself is reached through the [`driver::PageDriver`]
//! seam, so the whole pipeline can be exercised without a live Chrome.

/// CDP-backed driver over a chromiumoxide page
pub mod cdp;
pub mod chunk;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod session;
pub mod stitch;

pub use chunk::{Chunk, ChunkPosition};
pub use config::CaptureConfig;
pub use driver::{PageDriver, ScrollPosition};
pub use error::{CaptureError, StitchError};
pub use metrics::OverlayMetrics;
pub use session::{CaptureSession, SessionGuard};
