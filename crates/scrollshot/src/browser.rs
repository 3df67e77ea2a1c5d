//! Headless Chrome discovery, launch, and navigation.

use anyhow::{Result, anyhow};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Browser instance with its background CDP event handler.
pub struct ChromeBrowser {
    browser: Browser,
    _handler: JoinHandle<()>,
}

impl ChromeBrowser {
    /// Create a new tab.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab cannot be created.
    pub async fn new_page(&self) -> Result<Page> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    /// Close the browser, ignoring shutdown races.
    pub async fn close(mut self) {
        let _ignore_result = self.browser.close().await;
    }
}

/// Finds the Chrome executable on the system.
///
/// # Errors
///
/// Returns an error if Chrome cannot be found.
fn find_chrome_executable() -> Result<PathBuf> {
    // Check environment variable first
    if let Ok(chrome_bin) = env::var("CHROME_BIN") {
        let path = PathBuf::from(&chrome_bin);
        if path.exists() {
            return Ok(path);
        }
    }

    let path_candidates = ["google-chrome", "chromium", "chromium-browser"];

    for candidate in path_candidates {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            // Check if it's a real Chrome/Chromium (not a snap stub)
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            if (stdout.contains("Chrome") || stdout.contains("Chromium"))
                && !stderr.contains("snap")
            {
                return Ok(PathBuf::from(candidate));
            }
        }
    }

    Err(anyhow!(
        "Chrome/Chromium executable not found. Please install Chrome or set CHROME_BIN environment variable."
    ))
}

/// Launch a headless Chrome suitable for capture work.
///
/// Scrollbars are hidden so they never appear inside captured chunks, and
/// overlay scrollbars are disabled for the same reason.
///
/// # Errors
///
/// Returns an error if the browser cannot be found or fails to launch.
pub async fn launch(
    executable: Option<PathBuf>,
    width: u32,
    height: u32,
) -> Result<ChromeBrowser> {
    let chrome_path = match executable {
        Some(path) => path,
        None => find_chrome_executable()?,
    };
    info!("launching {}", chrome_path.display());

    let config_builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .no_sandbox()
        .window_size(width, height)
        .arg("--hide-scrollbars")
        .arg("--disable-gpu")
        .arg("--disable-features=OverlayScrollbar")
        .arg("--allow-file-access-from-files")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--mute-audio")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    let (browser, mut handler) = Browser::launch(
        config_builder
            .build()
            .map_err(|e| anyhow!("Browser config error: {}", e))?,
    )
    .await?;

    // Spawn background handler for Chrome events
    let handler_task = tokio::task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("Browser event error: {:?}", e);
            }
        }
    });

    Ok(ChromeBrowser {
        browser,
        _handler: handler_task,
    })
}

/// Navigates a page to the target URL and waits for it to finish loading.
///
/// # Errors
///
/// Returns an error if navigation fails or times out.
pub async fn navigate(page: &Page, url: &str) -> Result<()> {
    const NAV_TIMEOUT: Duration = Duration::from_secs(60);

    match timeout(NAV_TIMEOUT, page.goto(url)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            return Err(anyhow!("Navigation goto failed for {url}: {e}"));
        }
        Err(_) => {
            return Err(anyhow!("Navigation goto timeout for {url}"));
        }
    }

    // Wait for the page to finish loading before probing it; scripts hang
    // against a page that is not ready yet.
    match timeout(NAV_TIMEOUT, page.wait_for_navigation()).await {
        Ok(Ok(_)) => {
            info!("navigation completed for {url}");
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow!("Wait for navigation failed for {url}: {e}")),
        Err(_) => Err(anyhow!("Wait for navigation timeout for {url}")),
    }
}
