//! Configuration settings for the capture pipeline.
//!
//! Controls settle delays, overlay detection tolerance, script deadlines, and
//! the safety bound on chunk count. Configuration can be loaded from
//! environment variables or constructed programmatically.

use core::time::Duration;
use std::env;

/// Runtime configuration for a capture session.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Delay in milliseconds after each scroll, before the next capture,
    /// letting lazy-loaded content and overlay repositioning settle
    pub settle_ms: u64,
    /// Delay in milliseconds before the very first capture
    pub first_settle_ms: u64,
    /// Distance in CSS pixels from a viewport edge within which a fixed
    /// element counts as a top/bottom overlay
    pub edge_tolerance_px: u32,
    /// Deadline in milliseconds for in-page script evaluation
    pub script_timeout_ms: u64,
    /// Upper bound on captured chunks, capping runaway growing pages
    pub max_chunks: usize,
}

impl Default for CaptureConfig {
    #[inline]
    fn default() -> Self {
        Self {
            settle_ms: 300,
            first_settle_ms: 500,
            edge_tolerance_px: 10,
            script_timeout_ms: 10_000,
            max_chunks: 500,
        }
    }
}

impl CaptureConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables, falling back to defaults:
    /// - `SCROLLSHOT_SETTLE_MS`: post-scroll settle delay (default: 300)
    /// - `SCROLLSHOT_FIRST_SETTLE_MS`: delay before the first capture (default: 500)
    /// - `SCROLLSHOT_EDGE_TOLERANCE_PX`: overlay edge tolerance (default: 10)
    /// - `SCROLLSHOT_SCRIPT_TIMEOUT_MS`: page script deadline (default: 10000)
    /// - `SCROLLSHOT_MAX_CHUNKS`: chunk count safety bound (default: 500)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            settle_ms: env_u64("SCROLLSHOT_SETTLE_MS", defaults.settle_ms),
            first_settle_ms: env_u64("SCROLLSHOT_FIRST_SETTLE_MS", defaults.first_settle_ms),
            edge_tolerance_px: env_u64("SCROLLSHOT_EDGE_TOLERANCE_PX", u64::from(defaults.edge_tolerance_px)) as u32,
            script_timeout_ms: env_u64("SCROLLSHOT_SCRIPT_TIMEOUT_MS", defaults.script_timeout_ms).max(1),
            max_chunks: env_u64("SCROLLSHOT_MAX_CHUNKS", defaults.max_chunks as u64).max(1) as usize,
        }
    }

    /// Get the post-scroll settle delay as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Get the pre-first-capture settle delay as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn first_settle(&self) -> Duration {
        Duration::from_millis(self.first_settle_ms)
    }

    /// Get the page script deadline as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::CaptureConfig;

    #[test]
    fn defaults_match_documented_values() {
        let config = CaptureConfig::default();
        assert_eq!(config.settle_ms, 300);
        assert_eq!(config.first_settle_ms, 500);
        assert_eq!(config.edge_tolerance_px, 10);
        assert_eq!(config.max_chunks, 500);
    }
}
