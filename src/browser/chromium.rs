//! Chromium adapter over the DevTools protocol.
//!
//! One [`ChromiumSession`] owns the browser process, the task that drives the
//! DevTools connection, and a single page.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, FrameId, SetLifecycleEventsEnabledParams,
    Viewport as ClipRect,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport as EmulatedViewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::{BoundingBox, ElementQuery, EngineOptions, LoadState, RenderEngine, RenderSession};
use crate::{OgpError, Result, Viewport};

/// How long to wait for the browser process to exit after a graceful close.
const BROWSER_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

const FONTS_READY_SCRIPT: &str = r#"
(() => {
  if (!document.fonts || !document.fonts.ready) {
    return false;
  }
  return document.fonts.ready.then(() => true);
})()
"#;

// `{selector}` is replaced with a JSON string literal.
const QUERY_SCRIPT: &str = r#"
(() => {
  let nodes;
  try {
    nodes = document.querySelectorAll({selector});
  } catch (err) {
    return { valid: false, matches: 0, bounds: null };
  }
  if (nodes.length === 0) {
    return { valid: true, matches: 0, bounds: null };
  }
  const rect = nodes[0].getBoundingClientRect();
  return {
    valid: true,
    matches: nodes.length,
    bounds: {
      x: rect.left + window.scrollX,
      y: rect.top + window.scrollY,
      width: rect.width,
      height: rect.height
    }
  };
})()
"#;

/// Tracks page lifecycle events until the navigated document goes network-idle.
///
/// Events from the previous document end with its own `networkIdle`, so only
/// an idle that follows the new document's `init` counts.
#[derive(Debug, Clone)]
struct IdleWatch {
    main_frame: Option<FrameId>,
    committed: bool,
}

impl IdleWatch {
    fn new(main_frame: Option<FrameId>) -> Self {
        Self {
            main_frame,
            committed: false,
        }
    }

    /// Feeds one lifecycle event; returns true once the document is idle.
    fn observe(&mut self, frame_id: &FrameId, name: &str) -> bool {
        if let Some(main) = &self.main_frame {
            if frame_id != main {
                return false;
            }
        }
        match name {
            "init" => {
                self.committed = true;
                false
            }
            "networkIdle" => self.committed,
            _ => false,
        }
    }
}

async fn wait_until_idle<St>(mut events: St, mut watch: IdleWatch) -> Result<()>
where
    St: Stream<Item = (FrameId, String)> + Unpin,
{
    while let Some((frame_id, name)) = events.next().await {
        if watch.observe(&frame_id, &name) {
            return Ok(());
        }
    }
    Err(OgpError::DocumentLoadFailed(
        "page event stream ended before network idle".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct QueryProbe {
    valid: bool,
    matches: usize,
    bounds: Option<BoundingBox>,
}

/// Launches headless Chromium sessions.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    options: EngineOptions,
}

impl ChromiumEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self, viewport: Viewport) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .viewport(EmulatedViewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: viewport.width >= viewport.height,
                has_touch: false,
            })
            .request_timeout(self.options.request_timeout);
        if !self.options.headless {
            builder = builder.with_head();
        }
        if self.options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(OgpError::EngineUnavailable)
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    type Session = ChromiumSession;

    async fn open(&self, viewport: Viewport) -> Result<ChromiumSession> {
        let config = self.browser_config(viewport)?;
        debug!(%viewport, headless = self.options.headless, "launching chromium");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| OgpError::EngineUnavailable(format!("Failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "devtools handler event error");
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Some(browser),
            handler: Some(handler_task),
            page: None,
            lifecycle: None,
            main_frame: None,
            viewport,
            load_state: LoadState::Pending,
            url: None,
            closed: false,
        };

        let opened = session.browser()?.new_page("about:blank").await;
        let page = match opened {
            Ok(page) => page,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "failed to tear down partially opened browser");
                }
                return Err(OgpError::EngineUnavailable(format!(
                    "Failed to open page: {err}"
                )));
            }
        };
        session.page = Some(page);
        Ok(session)
    }
}

/// A running Chromium process with one page.
pub struct ChromiumSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
    lifecycle: Option<EventStream<EventLifecycleEvent>>,
    main_frame: Option<FrameId>,
    viewport: Viewport,
    load_state: LoadState,
    url: Option<Url>,
    closed: bool,
}

impl ChromiumSession {
    /// URL the page was last navigated to.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| OgpError::EngineUnavailable("browser session is closed".to_string()))
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| OgpError::EngineUnavailable("browser session is closed".to_string()))
    }

    async fn evaluate_json<T: DeserializeOwned>(
        &self,
        expression: &str,
        await_promise: bool,
    ) -> std::result::Result<T, String> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(await_promise)
            .return_by_value(true)
            .build()?;
        let result = self
            .page()
            .map_err(|e| e.to_string())?
            .evaluate_expression(params)
            .await
            .map_err(|e| e.to_string())?;
        result.into_value::<T>().map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn load_state(&self) -> LoadState {
        self.load_state
    }

    async fn goto(&mut self, url: &Url) -> Result<()> {
        let load_err = |e: chromiumoxide::error::CdpError| {
            OgpError::DocumentLoadFailed(format!("Navigation to {url} failed: {e}"))
        };
        self.load_state = LoadState::Pending;
        let page = self.page()?.clone();

        // Subscribe before navigating so the idle event cannot be missed.
        let lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(load_err)?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(load_err)?;
        let main_frame = page.mainframe().await.map_err(load_err)?;

        page.goto(url.as_str()).await.map_err(load_err)?;

        self.lifecycle = Some(lifecycle);
        self.main_frame = main_frame;
        self.url = Some(url.clone());
        Ok(())
    }

    async fn wait_for_network_idle(&mut self) -> Result<()> {
        let watch = IdleWatch::new(self.main_frame.clone());
        {
            let lifecycle = self.lifecycle.as_mut().ok_or_else(|| {
                OgpError::DocumentLoadFailed("network idle requested before navigation".to_string())
            })?;
            let events = lifecycle.map(|event| (event.frame_id.clone(), event.name.clone()));
            wait_until_idle(events, watch).await?;
        }
        self.lifecycle = None;
        self.load_state = LoadState::Idle;
        Ok(())
    }

    async fn fonts_ready(&mut self) -> Result<bool> {
        self.evaluate_json::<bool>(FONTS_READY_SCRIPT, true)
            .await
            .map_err(|e| OgpError::DocumentLoadFailed(format!("Font readiness probe failed: {e}")))
    }

    async fn query(&mut self, selector: &str) -> Result<ElementQuery> {
        let literal = serde_json::to_string(selector)
            .map_err(|_| OgpError::InvalidSelector {
                selector: selector.to_string(),
            })?;
        let script = QUERY_SCRIPT.replace("{selector}", &literal);
        let probe: QueryProbe = self.evaluate_json(&script, false).await.map_err(|e| {
            OgpError::EngineUnavailable(format!("Element query for '{selector}' failed: {e}"))
        })?;
        if !probe.valid {
            return Err(OgpError::InvalidSelector {
                selector: selector.to_string(),
            });
        }
        Ok(ElementQuery {
            matches: probe.matches,
            first: probe.bounds,
        })
    }

    async fn capture_png(&mut self, clip: &BoundingBox) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(ClipRect {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            })
            .from_surface(true)
            .capture_beyond_viewport(true)
            .omit_background(false)
            .build();
        self.page()?
            .screenshot(params)
            .await
            .map_err(|e| OgpError::CaptureFailed(format!("Screenshot failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.lifecycle = None;
        self.page = None;

        let mut outcome = Ok(());
        if let Some(mut browser) = self.browser.take() {
            match browser.close().await {
                Ok(_) => match timeout(BROWSER_EXIT_TIMEOUT, browser.wait()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => debug!(error = %err, "waiting for browser exit failed"),
                    Err(_) => warn!("browser did not exit within {:?}", BROWSER_EXIT_TIMEOUT),
                },
                Err(err) => {
                    outcome = Err(OgpError::EngineUnavailable(format!(
                        "Failed to close browser: {err}"
                    )));
                }
            }
            // Dropping the handle kills the child if it is still running.
            drop(browser);
        }
        if let Some(task) = self.handler.take() {
            task.abort();
        }
        debug!("chromium session closed");
        outcome
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler.take() {
            task.abort();
        }
    }
}
