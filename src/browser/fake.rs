//! In-memory engine for exercising the pipeline without a browser.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use url::Url;

use super::{BoundingBox, ElementQuery, LoadState, RenderEngine, RenderSession};
use crate::{OgpError, Result, Viewport};

/// An element of the fake document, matched by exact selector string.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub selector: String,
    pub bounds: BoundingBox,
    pub color: [u8; 4],
}

impl FakeElement {
    pub fn new(selector: &str, width: f64, height: f64, color: [u8; 4]) -> Self {
        Self {
            selector: selector.to_string(),
            bounds: BoundingBox {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
            color,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.bounds.x = x;
        self.bounds.y = y;
        self
    }
}

/// Which step the fake should fail or stall at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    Open,
    Navigate,
    HangNavigate,
    HangIdle,
    Capture,
    Close,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub open: AtomicUsize,
    pub close: AtomicUsize,
    pub fonts: AtomicUsize,
    pub log: Mutex<Vec<String>>,
}

impl Calls {
    pub fn opens(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.close.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, entry: impl Into<String>) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry.into());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    pub elements: Vec<FakeElement>,
    pub fault: Fault,
    pub fonts_api: Option<bool>,
    pub calls: Arc<Calls>,
}

impl FakeEngine {
    pub fn with_elements(elements: Vec<FakeElement>) -> Self {
        Self {
            elements,
            fonts_api: Some(true),
            ..Self::default()
        }
    }

    pub fn failing(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    type Session = FakeSession;

    async fn open(&self, viewport: Viewport) -> Result<FakeSession> {
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        self.calls.record("open");
        if self.fault == Fault::Open {
            return Err(OgpError::EngineUnavailable("fake engine refused to start".into()));
        }
        Ok(FakeSession {
            engine: self.clone(),
            viewport,
            load_state: LoadState::Pending,
            url: None,
            closed: false,
        })
    }
}

pub struct FakeSession {
    engine: FakeEngine,
    viewport: Viewport,
    load_state: LoadState,
    url: Option<Url>,
    closed: bool,
}

impl FakeSession {
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn load_state(&self) -> LoadState {
        self.load_state
    }

    async fn goto(&mut self, url: &Url) -> Result<()> {
        self.engine.calls.record(format!("goto {url}"));
        match self.engine.fault {
            Fault::Navigate => Err(OgpError::DocumentLoadFailed("net::ERR_FILE_NOT_FOUND".into())),
            Fault::HangNavigate => std::future::pending().await,
            _ => {
                self.url = Some(url.clone());
                Ok(())
            }
        }
    }

    async fn wait_for_network_idle(&mut self) -> Result<()> {
        if self.engine.fault == Fault::HangIdle {
            return std::future::pending().await;
        }
        self.engine.calls.record("idle");
        self.load_state = LoadState::Idle;
        Ok(())
    }

    async fn fonts_ready(&mut self) -> Result<bool> {
        self.engine.calls.fonts.fetch_add(1, Ordering::SeqCst);
        match self.engine.fonts_api {
            Some(ready) => Ok(ready),
            None => Err(OgpError::DocumentLoadFailed("fonts probe blew up".into())),
        }
    }

    async fn query(&mut self, selector: &str) -> Result<ElementQuery> {
        self.engine.calls.record(format!("query {selector}"));
        // stand-in for the browser's selector syntax check
        if selector.contains("[[") {
            return Err(OgpError::InvalidSelector {
                selector: selector.to_string(),
            });
        }
        let mut matching = self.engine.elements.iter().filter(|e| e.selector == selector);
        let first = matching.next().map(|e| e.bounds);
        let matches = first.map(|_| 1 + matching.count()).unwrap_or(0);
        Ok(ElementQuery { matches, first })
    }

    async fn capture_png(&mut self, clip: &BoundingBox) -> Result<Vec<u8>> {
        self.engine.calls.record("capture");
        if self.engine.fault == Fault::Capture {
            return Err(OgpError::CaptureFailed("compositor crashed".into()));
        }
        let color = self
            .engine
            .elements
            .iter()
            .find(|e| e.bounds == *clip)
            .map(|e| e.color)
            .unwrap_or([255, 255, 255, 255]);
        let (w, h) = clip.pixel_size();
        let img = RgbaImage::from_pixel(w, h, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .map_err(|e| OgpError::CaptureFailed(e.to_string()))?;
        Ok(buf.into_inner())
    }

    async fn close(&mut self) -> Result<()> {
        // Every call counts, including no-op repeats.
        self.engine.calls.close.fetch_add(1, Ordering::SeqCst);
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.engine.calls.record("close");
        if self.engine.fault == Fault::Close {
            return Err(OgpError::EngineUnavailable("browser already gone".into()));
        }
        Ok(())
    }
}
