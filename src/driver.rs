//! Page driver abstraction.
//!
//! The harvest loop and image fetcher only ever talk to the browser through
//! [`PageDriver`]. The Chromium implementation lives in [`crate::browser`];
//! tests substitute an in-memory page.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Opaque handle to an element in the current document.
///
/// Handles carry no object identity from the browser. A handle whose node
/// was re-rendered resolves to [`DriverError::Stale`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element query in one of the two dialects the page understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Css(&'static str),
    XPath(&'static str),
}

impl Selector {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
        }
    }

    pub fn expr(&self) -> &'static str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.expr())
    }
}

/// Keys the harvester knows how to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    PageDown,
}

impl Key {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PageDown => "PageDown",
        }
    }

    /// Windows virtual key code, which Chromium requires for default actions.
    pub fn key_code(&self) -> i64 {
        match self {
            Self::PageDown => 34,
        }
    }
}

/// Argument passed to [`PageDriver::execute`], exposed to the script as
/// `arguments[i]`.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Element(ElementRef),
    Value(Value),
}

impl From<&ElementRef> for ScriptArg {
    fn from(el: &ElementRef) -> Self {
        Self::Element(el.clone())
    }
}

impl From<i64> for ScriptArg {
    fn from(v: i64) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<&str> for ScriptArg {
    fn from(v: &str) -> Self {
        Self::Value(Value::from(v))
    }
}

/// Errors raised by page interactions.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found")]
    NotFound,

    #[error("stale element reference: {0}")]
    Stale(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("script failed: {0}")]
    Script(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("browser session lost: {0}")]
    Disconnected(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Transient failures are recovered where they occur: a fallback
    /// selector, a re-query on the next cycle, or a field default.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Disconnected(_) | Self::Launch(_) | Self::Io(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Browser page primitives consumed by the harvester.
///
/// `scope: None` means the whole document; scroll methods given `None`
/// act on the window.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn execute(&self, script: &str, args: &[ScriptArg]) -> DriverResult<Value>;

    async fn find(
        &self,
        scope: Option<&ElementRef>,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementRef>>;

    async fn attribute(&self, el: &ElementRef, name: &str) -> DriverResult<Option<String>>;

    /// Rendered text of the element, as a user would see it.
    async fn text(&self, el: &ElementRef) -> DriverResult<String>;

    /// Visible and enabled.
    async fn is_displayed(&self, el: &ElementRef) -> DriverResult<bool>;

    async fn scroll_by(&self, target: Option<&ElementRef>, delta: i64) -> DriverResult<()>;

    async fn scroll_offset(&self, target: Option<&ElementRef>) -> DriverResult<i64>;

    /// `(scroll_height, client_height)` of the element.
    async fn scroll_extent(&self, el: &ElementRef) -> DriverResult<(i64, i64)>;

    async fn click(&self, el: &ElementRef) -> DriverResult<()>;

    async fn send_keys(&self, el: &ElementRef, key: Key) -> DriverResult<()>;

    async fn screenshot(&self, path: &Path) -> DriverResult<()>;

    async fn quit(&self) -> DriverResult<()>;
}
