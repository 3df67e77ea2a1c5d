//! Command-line full-page screenshot tool.
//!
//! Captures a possibly infinite-scrolling page as a sequence of viewport
//! chunks with sticky headers/footers cropped out, stitches them vertically,
//! and writes one tall PNG.

use anyhow::{Context as _, Result, anyhow};
use clap::{Parser, ValueEnum};
use log::{error, info};
use page_capture::cdp::CdpDriver;
use page_capture::session::{CaptureSession, SessionGuard};
use page_capture::stitch::{encode_png, stitch};
use page_capture::{CaptureConfig, Chunk};
use std::fs::{create_dir_all, write};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use url::Url;

mod browser;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Scroll and capture unattended until the page bottom is reached
    Auto,
    /// Capture one chunk per Enter key press; type "end" to stitch
    Manual,
}

/// Stitch a full, scrolling web page into one tall PNG.
#[derive(Debug, Parser)]
#[command(name = "scrollshot", version)]
struct Args {
    /// Page to capture
    url: String,

    /// Output PNG path
    #[arg(short, long, default_value = "fullpage_screenshot.png")]
    output: PathBuf,

    /// Viewport width in CSS pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in CSS pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Capture mode
    #[arg(long, value_enum, default_value = "auto")]
    mode: Mode,

    /// Override the post-scroll settle delay in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Chrome/Chromium executable (otherwise discovered via CHROME_BIN/PATH)
    #[arg(long)]
    chrome: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let url = Url::parse(&args.url)
        .with_context(|| format!("invalid target URL: {}", args.url))?;

    let mut config = CaptureConfig::from_env();
    if let Some(settle_ms) = args.settle_ms {
        config.settle_ms = settle_ms;
    }

    let chrome = browser::launch(args.chrome.clone(), args.width, args.height).await?;
    let outcome = capture(&args, &config, &chrome, &url).await;
    chrome.close().await;

    let chunks = outcome?;
    let stitched = stitch(&chunks)?;
    let bytes = encode_png(&stitched).map_err(page_capture::StitchError::Encode)?;

    if let Some(parent) = args.output.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }
    write(&args.output, &bytes)?;
    info!(
        "wrote {}x{} image ({} chunks) to {}",
        stitched.width(),
        stitched.height(),
        chunks.len(),
        args.output.display()
    );
    Ok(())
}

async fn capture(
    args: &Args,
    config: &CaptureConfig,
    chrome: &browser::ChromeBrowser,
    url: &Url,
) -> Result<Vec<Chunk>> {
    let page = chrome.new_page().await?;
    browser::navigate(&page, url.as_str()).await?;

    let driver = CdpDriver::new(page, config);
    driver.set_viewport(args.width, args.height).await?;

    let guard = SessionGuard::new();
    let _permit = guard.try_acquire()?;

    let mut session = CaptureSession::new(config.clone());
    let result = match args.mode {
        Mode::Auto => session.run_full_page(&driver).await,
        Mode::Manual => manual_loop(&mut session, &driver).await,
    };

    if let Err(err) = result {
        error!(
            "capture aborted: {err} ({} chunks preserved, no output written)",
            session.chunks().len()
        );
        return Err(err.into());
    }
    if session.chunks().is_empty() {
        return Err(anyhow!("no chunks captured"));
    }
    Ok(session.finish())
}

/// Drive the session one chunk per line of input, the way the original
/// start/scroll/end buttons did.
async fn manual_loop(session: &mut CaptureSession, driver: &CdpDriver) -> Result<(), page_capture::CaptureError> {
    session.begin(driver).await?;
    info!("first chunk captured; Enter = scroll & capture next, \"end\" = stitch & save");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().eq_ignore_ascii_case("end") {
            break;
        }
        let done = session.advance(driver).await?;
        if done {
            info!("reached bottom; stitching");
            break;
        }
        info!("chunk captured; Enter for the next one, \"end\" to finish");
    }
    Ok(())
}
