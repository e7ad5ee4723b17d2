//! Headless rendering engine seam.
//!
//! The pipeline talks to the browser only through [`RenderEngine`] and
//! [`RenderSession`], so every stage can run against Chromium in production
//! and against an in-memory engine in tests.
//!
//! # Module Structure
//!
//! - [`chromium`] - Chromium over the DevTools protocol (`chromiumoxide`)
//!
//! # Example
//!
//! ```no_run
//! use ogp_lib::browser::{ChromiumEngine, EngineOptions, RenderEngine, RenderSession};
//! use ogp_lib::Viewport;
//!
//! # async fn example() -> ogp_lib::Result<()> {
//! let engine = ChromiumEngine::new(EngineOptions::default());
//! let mut session = engine.open(Viewport::default()).await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod chromium;
#[cfg(test)]
pub(crate) mod fake;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, Viewport};

pub use chromium::{ChromiumEngine, ChromiumSession};

/// Default timeout for a single DevTools request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Launch options for the browser process.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Explicit Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_executable: Option<PathBuf>,
    /// Whether to run without a visible window.
    pub headless: bool,
    /// Pass `--no-sandbox` (needed in most containers).
    pub no_sandbox: bool,
    /// Timeout for individual DevTools requests.
    pub request_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            no_sandbox: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Load state of the session's page surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Pending,
    Idle,
}

/// Rectangle occupied by a rendered element, in CSS pixels relative to the page origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Size in device pixels at a scale factor of 1.
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }

    /// True when the box would rasterize to zero pixels in either dimension.
    pub fn is_empty(&self) -> bool {
        let (w, h) = self.pixel_size();
        w == 0 || h == 0
    }
}

fn to_pixels(len: f64) -> u32 {
    if !len.is_finite() || len <= 0.0 {
        return 0;
    }
    len.round().min(u32::MAX as f64) as u32
}

/// Result of querying the document for a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementQuery {
    /// Number of elements matching the selector.
    pub matches: usize,
    /// Bounds of the first match in document order.
    pub first: Option<BoundingBox>,
}

/// Starts isolated rendering sessions.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    type Session: RenderSession;

    /// Launches the engine and opens a single page sized to `viewport`.
    ///
    /// Fails with `EngineUnavailable`; a partially started engine is torn
    /// down before the error is returned.
    async fn open(&self, viewport: Viewport) -> Result<Self::Session>;
}

/// One live engine instance with exactly one page surface.
#[async_trait]
pub trait RenderSession: Send {
    fn viewport(&self) -> Viewport;

    fn load_state(&self) -> LoadState;

    /// Starts navigating the page to `url` and returns once the navigation commits.
    async fn goto(&mut self, url: &Url) -> Result<()>;

    /// Resolves once the page reports no in-flight network requests.
    async fn wait_for_network_idle(&mut self) -> Result<()>;

    /// Awaits the document's font loading. `Ok(false)` means the page has no
    /// font-loading API to probe.
    async fn fonts_ready(&mut self) -> Result<bool>;

    /// Queries the document for `selector`.
    async fn query(&mut self, selector: &str) -> Result<ElementQuery>;

    /// Captures `clip` as PNG bytes, keeping the page background.
    async fn capture_png(&mut self, clip: &BoundingBox) -> Result<Vec<u8>>;

    /// Terminates the engine. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}
