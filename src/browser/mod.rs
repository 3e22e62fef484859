//! Chromium page driver.
//!
//! Uses chromiumoxide (CDP). Element handles are tagged onto the DOM with a
//! data attribute so they survive between round-trips; every primitive is
//! a small script run through one envelope that reports stale handles and
//! script errors separately.

mod config;
pub mod scripts;

pub use config::BrowserEngineConfig;

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::info;

use crate::driver::{DriverError, DriverResult, ElementRef, PageDriver, ScriptArg};

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::error::CdpError;
#[cfg(feature = "browser")]
use chromiumoxide::page::ScreenshotParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

#[cfg(feature = "browser")]
use crate::driver::{Key, Selector};
#[cfg(feature = "browser")]
use crate::user_agent::resolve_user_agent;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find a Chrome executable: configured path, well-known locations, PATH.
pub fn find_chrome(configured: Option<&Path>) -> DriverResult<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(DriverError::Launch(format!(
            "Configured Chrome path does not exist: {}",
            path.display()
        )));
    }

    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(DriverError::Launch(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or download from: https://www.google.com/chrome/"
            .to_string(),
    ))
}

/// `/json/version` endpoint for a DevTools URL given as ws:// or http://.
pub fn version_endpoint(remote_url: &str) -> String {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    format!("{}/json/version", http_url.trim_end_matches('/'))
}

/// Encode script arguments; element handles become `{"__ref": id}`.
pub fn encode_args(args: &[ScriptArg]) -> String {
    let values: Vec<Value> = args
        .iter()
        .map(|arg| match arg {
            ScriptArg::Element(el) => json!({ "__ref": el.as_str() }),
            ScriptArg::Value(v) => v.clone(),
        })
        .collect();
    Value::Array(values).to_string()
}

/// Unpack the envelope produced by [`scripts::EXECUTE_TEMPLATE`].
pub fn unwrap_envelope(envelope: Value) -> DriverResult<Value> {
    if let Some(id) = envelope.get("stale").and_then(Value::as_str) {
        return Err(DriverError::Stale(id.to_string()));
    }
    if let Some(message) = envelope.get("error").and_then(Value::as_str) {
        return Err(DriverError::Script(message.to_string()));
    }
    match envelope {
        Value::Object(mut map) => Ok(map.remove("value").unwrap_or(Value::Null)),
        other => Err(DriverError::Script(format!(
            "unexpected script result: {}",
            other
        ))),
    }
}

fn expect_i64(value: &Value) -> DriverResult<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| DriverError::Script(format!("expected a number, got {}", value)))
}

/// Launch or connect to Chrome and return a driver for a fresh page.
#[cfg(feature = "browser")]
pub async fn launch(config: &BrowserEngineConfig) -> DriverResult<Box<dyn PageDriver>> {
    Ok(Box::new(ChromeDriver::launch(config.clone()).await?))
}

#[cfg(not(feature = "browser"))]
pub async fn launch(_config: &BrowserEngineConfig) -> DriverResult<Box<dyn PageDriver>> {
    Err(DriverError::Unsupported(
        "Browser support not compiled. Rebuild with: cargo build --features browser",
    ))
}

/// [`PageDriver`] over a single Chromium tab.
#[cfg(feature = "browser")]
pub struct ChromeDriver {
    config: BrowserEngineConfig,
    browser: Mutex<Browser>,
    page: Page,
}

#[cfg(feature = "browser")]
impl ChromeDriver {
    pub async fn launch(config: BrowserEngineConfig) -> DriverResult<Self> {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());

        let (browser, handler) = match config.remote_url.as_deref() {
            Some(remote_url) => Self::connect_remote(remote_url).await?,
            None => Self::launch_local(&config, &user_agent).await?,
        };
        Self::spawn_handler(handler);

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to open page: {}", e)))?;

        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(cdp_error)?;

        Ok(Self {
            config,
            browser: Mutex::new(browser),
            page,
        })
    }

    async fn launch_local(
        config: &BrowserEngineConfig,
        user_agent: &str,
    ) -> DriverResult<(Browser, Handler)> {
        info!("Launching browser (headless={})", config.headless);

        let chrome_path = find_chrome(config.chrome_path.as_deref())?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.window_width, config.window_height)
            .request_timeout(Duration::from_secs(config.timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg(format!("--user-agent={}", user_agent))
            .arg(format!(
                "--window-size={},{}",
                config.window_width, config.window_height
            ))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("Failed to build browser config: {}", e)))?;

        Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to launch browser: {}", e)))
    }

    async fn connect_remote(url: &str) -> DriverResult<(Browser, Handler)> {
        info!("Connecting to remote browser at {}", url);

        let version: Value = reqwest::Client::new()
            .get(version_endpoint(url))
            .send()
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to parse browser version info: {}", e)))?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Launch("No webSocketDebuggerUrl in response".to_string()))?;

        info!("Connecting to WebSocket: {}", ws_url);
        Browser::connect(ws_url)
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to connect to remote browser: {}", e)))
    }

    fn spawn_handler(mut handler: Handler) {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });
    }

    /// Run `body` inside the envelope script and return its value.
    async fn run(&self, body: &str, args: &[ScriptArg]) -> DriverResult<Value> {
        let script = scripts::wrap(body, &encode_args(args));
        let envelope: Value = self
            .page
            .evaluate(script)
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(|e| DriverError::Script(format!("unreadable script result: {}", e)))?;
        unwrap_envelope(envelope)
    }

    async fn wait_for_page_ready(&self) {
        let ready_timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(
            ready_timeout,
            self.page.evaluate(scripts::WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn apply_stealth(&self) {
        debug!("Applying stealth scripts");
        for script in scripts::STEALTH_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: Key) -> DriverResult<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.name())
            .code(key.name())
            .windows_virtual_key_code(key.key_code())
            .build()
            .map_err(DriverError::Script)?;
        self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }
}

/// Timeouts and in-page failures are recoverable; anything else means the
/// connection to the browser is gone.
#[cfg(feature = "browser")]
fn cdp_error(e: CdpError) -> DriverError {
    match e {
        CdpError::Timeout => DriverError::Script("CDP request timed out".to_string()),
        CdpError::ChromeMessage(_) | CdpError::JavascriptException(_) => {
            DriverError::Script(e.to_string())
        }
        other => DriverError::Disconnected(other.to_string()),
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        info!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Script(format!("Invalid URL: {}", e)))?;
        self.page.execute(params).await.map_err(cdp_error)?;

        self.wait_for_page_ready().await;
        if self.config.stealth {
            self.apply_stealth().await;
        }
        Ok(())
    }

    async fn execute(&self, script: &str, args: &[ScriptArg]) -> DriverResult<Value> {
        self.run(script, args).await
    }

    async fn find(
        &self,
        scope: Option<&ElementRef>,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementRef>> {
        let root = match scope {
            Some(el) => ScriptArg::from(el),
            None => ScriptArg::Value(Value::Null),
        };
        let value = self
            .run(
                scripts::FIND,
                &[root, selector.kind().into(), selector.expr().into()],
            )
            .await?;

        let ids = value
            .as_array()
            .ok_or_else(|| DriverError::Script(format!("expected an array, got {}", value)))?;
        Ok(ids
            .iter()
            .filter_map(Value::as_str)
            .map(ElementRef::new)
            .collect())
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .run(scripts::ATTRIBUTE, &[el.into(), name.into()])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn text(&self, el: &ElementRef) -> DriverResult<String> {
        let value = self.run(scripts::TEXT, &[el.into()]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_displayed(&self, el: &ElementRef) -> DriverResult<bool> {
        let value = self.run(scripts::IS_DISPLAYED, &[el.into()]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn scroll_by(&self, target: Option<&ElementRef>, delta: i64) -> DriverResult<()> {
        match target {
            Some(el) => {
                self.run(scripts::SCROLL_ELEMENT_BY, &[el.into(), delta.into()])
                    .await?
            }
            None => self.run(scripts::SCROLL_WINDOW_BY, &[delta.into()]).await?,
        };
        Ok(())
    }

    async fn scroll_offset(&self, target: Option<&ElementRef>) -> DriverResult<i64> {
        let value = match target {
            Some(el) => self.run(scripts::ELEMENT_OFFSET, &[el.into()]).await?,
            None => self.run(scripts::WINDOW_OFFSET, &[]).await?,
        };
        expect_i64(&value)
    }

    async fn scroll_extent(&self, el: &ElementRef) -> DriverResult<(i64, i64)> {
        let value = self.run(scripts::EXTENT, &[el.into()]).await?;
        match value.as_array().map(Vec::as_slice) {
            Some([height, client]) => Ok((expect_i64(height)?, expect_i64(client)?)),
            _ => Err(DriverError::Script(format!(
                "expected [scrollHeight, clientHeight], got {}",
                value
            ))),
        }
    }

    async fn click(&self, el: &ElementRef) -> DriverResult<()> {
        match self.run(scripts::CLICK, &[el.into()]).await {
            Ok(_) => Ok(()),
            Err(DriverError::Script(msg)) if msg.contains("disabled") => {
                Err(DriverError::NotInteractable(el.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn send_keys(&self, el: &ElementRef, key: Key) -> DriverResult<()> {
        self.run(scripts::FOCUS, &[el.into()]).await?;
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        let bytes = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(cdp_error)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        info!("Saved screenshot to {}", path.display());
        Ok(())
    }

    async fn quit(&self) -> DriverResult<()> {
        if self.config.remote_url.is_some() {
            // Leave a shared browser running; only drop our tab.
            self.page.clone().close().await.map_err(cdp_error)?;
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(cdp_error)?;
        let _ = browser.wait().await;
        Ok(())
    }
}
