//! [`PageDriver`] implementation over a chromiumoxide CDP page.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page;
use core::time::Duration;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;

use crate::config::CaptureConfig;
use crate::driver::{PageDriver, ScrollPosition};
use crate::error::CaptureError;
use crate::metrics::{OverlayMetrics, overlay_probe_script, scroll_script};

/// Driver over a live Chrome tab reached through the DevTools protocol.
pub struct CdpDriver {
    page: Page,
    script_timeout: Duration,
    edge_tolerance_px: u32,
}

impl CdpDriver {
    /// Wrap a chromiumoxide page with the configured deadlines and tolerance.
    #[must_use]
    pub fn new(page: Page, config: &CaptureConfig) -> Self {
        Self {
            page,
            script_timeout: config.script_timeout(),
            edge_tolerance_px: config.edge_tolerance_px,
        }
    }

    /// Override the emulated viewport size before capturing.
    ///
    /// Chrome subtracts scrollbar width (16px) from the viewport in headless
    /// mode; the width is widened to compensate so captures match the
    /// requested size (the stitcher keeps the first chunk's width as-is).
    ///
    /// # Errors
    ///
    /// Returns an error if the CDP command fails.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CaptureError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width) + 16)
            .height(i64::from(height))
            .device_scale_factor(0.0)
            .mobile(false)
            .build()
            .map_err(CaptureError::ScriptExecution)?;
        self.page
            .execute(params)
            .await
            .map_err(|err| CaptureError::ScriptExecution(err.to_string()))?;
        Ok(())
    }

    /// Evaluate a script that returns a JSON string and parse it into `T`.
    async fn eval_json<T: DeserializeOwned>(&self, script: &str) -> Result<T, CaptureError> {
        let result = timeout(self.script_timeout, self.page.evaluate(script))
            .await
            .map_err(|_| CaptureError::ScriptTimeout(self.script_timeout.as_millis() as u64))?
            .map_err(|err| CaptureError::ScriptExecution(err.to_string()))?;

        let payload = result
            .value()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CaptureError::ScriptExecution("page probe returned a non-string payload".to_string())
            })?;
        Ok(serde_json::from_str(payload)?)
    }
}

impl PageDriver for CdpDriver {
    async fn overlay_metrics(&self) -> Result<OverlayMetrics, CaptureError> {
        self.eval_json(&overlay_probe_script(self.edge_tolerance_px))
            .await
    }

    async fn scroll_by(&self, step_css_px: f64) -> Result<ScrollPosition, CaptureError> {
        self.eval_json(&scroll_script(step_css_px)).await
    }

    async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(true)
            .build();
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|err| CaptureError::Screenshot(err.to_string()))?;
        let base64_str: &str = response.data.as_ref();
        BASE64_STANDARD
            .decode(base64_str)
            .map_err(|err| CaptureError::Screenshot(format!("base64 decode failed: {err}")))
    }
}
