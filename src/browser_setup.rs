//! Chrome/Chromium discovery and launch.
//!
//! Finds a locally installed browser (environment override, well-known
//! paths, then `which`), falling back to a managed download. Each launch
//! gets its own profile directory so concurrently running instances do
//! not contend on profile locks.

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::BrowserConfig;

/// Locate a Chrome/Chromium executable on this system.
pub async fn find_browser_executable() -> Result<PathBuf> {
    // Environment override wins over everything else.
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to a non-existent file: {}",
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            debug!("found browser at {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for name in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(name).output() {
                if output.status.success() {
                    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !found.is_empty() {
                        return Ok(PathBuf::from(found));
                    }
                }
            }
        }
    }

    anyhow::bail!("Chrome/Chromium executable not found")
}

/// Download a managed Chromium into the user cache and return its
/// executable path.
pub async fn download_managed_browser() -> Result<PathBuf> {
    info!("no local browser found, downloading managed Chromium");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("trolley/chromium");
    std::fs::create_dir_all(&cache_dir).context("failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("failed to fetch browser")?;

    info!("downloaded Chromium to {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Launch one browser instance with its own profile directory.
///
/// Returns the browser, its CDP event-handler task, and the profile
/// directory the caller must remove once the browser has exited.
pub async fn launch_browser(config: &BrowserConfig) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let executable = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    // Unique per process AND per launch: pools run several instances at
    // once and Chrome refuses to share a profile directory.
    static LAUNCH_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = LAUNCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let user_data_dir =
        std::env::temp_dir().join(format!("trolley_chrome_{}_{}", std::process::id(), seq));
    std::fs::create_dir_all(&user_data_dir).context("failed to create profile directory")?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(&user_data_dir)
        .chrome_executable(executable)
        .arg("--disable-notifications")
        .arg("--disable-popup-blocking")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio");

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    if config.disable_security {
        warn!("browser security features disabled by configuration");
        builder = builder
            .arg("--disable-web-security")
            .arg("--ignore-certificate-errors");
    }

    // setuid sandboxing does not work inside containers.
    if running_in_container() {
        builder = builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
    }

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = match Browser::launch(browser_config).await {
        Ok(launched) => launched,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&user_data_dir);
            return Err(anyhow::anyhow!("failed to launch browser: {e}"));
        }
    };

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                // Chrome emits CDP events chromiumoxide cannot always
                // deserialize; those are noise, not failures.
                let message = e.to_string();
                if message.contains("data did not match any variant") {
                    debug!("ignoring unrecognized CDP event");
                } else {
                    warn!("browser handler error: {message}");
                }
            }
        }
        debug!("browser handler finished");
    });

    Ok((browser, handler_task, user_data_dir))
}

fn running_in_container() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}
