//! Error taxonomy for the capture pipeline.
//!
//! Capture and script failures abort the in-progress session but leave the
//! chunks gathered so far readable. Decode failures are recovered locally
//! (raw-bytes fallback while cropping, skip-the-chunk while stitching) and
//! never surface through these types.

use thiserror::Error;

/// Failures that abort a capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The browser denied or could not produce a viewport snapshot.
    #[error("viewport screenshot failed: {0}")]
    Screenshot(String),

    /// A measurement or scroll script failed inside the page context.
    #[error("page script execution failed: {0}")]
    ScriptExecution(String),

    /// A page script did not come back before the deadline.
    #[error("page script evaluation timed out after {0}ms")]
    ScriptTimeout(u64),

    /// The page probe returned a payload the typed contract cannot parse.
    #[error("malformed page probe payload: {0}")]
    BadProbePayload(#[from] serde_json::Error),

    /// A capture step was requested before the session captured its first chunk.
    #[error("capture session has not been started")]
    SessionNotStarted,

    /// A second session was started while one is already in flight.
    #[error("a capture session is already in flight")]
    SessionBusy,
}

/// Failures while compositing chunks into the final image.
#[derive(Debug, Error)]
pub enum StitchError {
    /// Every chunk failed to decode; there is nothing to compose.
    #[error("no valid chunk images to stitch")]
    NoValidChunks,

    /// The final image could not be serialized to PNG.
    #[error("failed to encode stitched image: {0}")]
    Encode(#[from] image::ImageError),
}
