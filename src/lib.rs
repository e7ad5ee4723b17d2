//! Open Graph preview image generator library.
//!
//! Renders a local HTML template in headless Chromium and captures one
//! element of it as an opaque PNG suitable for `og:image` / `twitter:image`.
//!
//! # Module Overview
//!
//! - [`browser`] - Rendering engine seam and the Chromium session
//! - [`loader`] - Template path to `file://` URL, navigation, network idle
//! - [`stabilize`] - Settle delay / font readiness after network idle
//! - [`locator`] - Selector to target element
//! - [`capture`] - Element capture and atomic PNG output
//! - [`pipeline`] - Stage orchestration with guaranteed teardown
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use ogp_lib::browser::{ChromiumEngine, EngineOptions};
//! use ogp_lib::{Config, Pipeline, PipelineOptions};
//!
//! # async fn example() -> ogp_lib::Result<()> {
//! let config = Config::default();
//! let engine = ChromiumEngine::new(EngineOptions::default());
//! let report = Pipeline::new(engine, PipelineOptions::from(&config)).run().await?;
//! println!("wrote {}", report.capture.path.display());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod loader;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stabilize;
pub mod viewport;

pub use browser::{ChromiumEngine, EngineOptions, RenderEngine, RenderSession};
pub use capture::CaptureResult;
pub use config::Config;
pub use error::{ErrorPayload, OgpError, Result, Stage};
pub use locator::TargetElement;
pub use output::{ErrorOutput, GenerateOutput, OgpOutput, OGP_OUTPUT_VERSION};
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport, PipelineState};
pub use progress::ProgressCallback;
pub use stabilize::Stabilization;
pub use viewport::Viewport;
