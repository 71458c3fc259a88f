//! Driver configuration with environment-driven defaults.

use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};
use which::which;

/// Configuration for launching and tuning the driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Chromium executable; auto-detected when empty.
    pub executable: PathBuf,
    /// Profile directory handed to Chromium.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Deadline applied to individual CDP commands.
    pub default_deadline_ms: u64,
    /// Interval between polls inside wait loops.
    pub poll_interval_ms: u64,
    /// Attach to an already-running browser instead of launching one.
    pub websocket_url: Option<String>,
    pub heartbeat_interval_ms: u64,
    /// When false the driver runs on the noop transport; every command
    /// fails fast instead of touching a browser.
    pub use_real_chrome: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            default_deadline_ms: 30_000,
            poll_interval_ms: 100,
            websocket_url: None,
            heartbeat_interval_ms: 15_000,
            use_real_chrome: resolve_real_chrome_default(),
        }
    }
}

fn resolve_real_chrome_default() -> bool {
    // PAGEHAND_USE_REAL_CHROME: "0", "false", "no", "off" select the noop
    // transport.
    match env::var("PAGEHAND_USE_REAL_CHROME") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn resolve_headless_default() -> bool {
    // PAGEHAND_HEADLESS: "0", "false", "no", "off" request a headful browser.
    match env::var("PAGEHAND_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("PAGEHAND_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.pagehand-profile").into()
}

pub(crate) fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("PAGEHAND_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    for candidate in os_specific_chrome_paths() {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    let root = PathBuf::from(trimmed);
                    paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                    paths.push(root.join("Chromium/Application/chrome.exe"));
                }
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}
