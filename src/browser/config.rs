//! Browser launch configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Browser launch and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run without a visible window.
    #[serde(default)]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    /// Also used for image downloads.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Chrome executable. Looked up in well-known locations and on PATH
    /// when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Apply the stealth patches after each navigation.
    #[serde(default = "default_stealth")]
    pub stealth: bool,

    /// Fixed user agent. A random desktop one is chosen when unset.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Save a full-page screenshot here when a harvest fails.
    #[serde(default)]
    pub failure_screenshot: Option<PathBuf>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: false,
            proxy: None,
            timeout: default_timeout(),
            chrome_path: None,
            chrome_args: Vec::new(),
            remote_url: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            stealth: default_stealth(),
            user_agent: None,
            failure_screenshot: None,
        }
    }
}

pub fn default_timeout() -> u64 {
    30
}

pub fn default_window_width() -> u32 {
    1920
}

pub fn default_window_height() -> u32 {
    1080
}

pub fn default_stealth() -> bool {
    true
}
