//! Orchestration of a single capture run.
//!
//! ```text
//! Idle -> SessionOpen -> DocumentLoaded -> Stabilized -> ElementLocated -> Captured -> Closed
//!   \__________\______________\_______________\______________\__________> Failed
//! ```
//!
//! The session is opened once and closed exactly once, after the stages
//! finish or the first one fails.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::browser::{RenderEngine, RenderSession};
use crate::capture::{self, CaptureResult};
use crate::config::Config;
use crate::loader::{self, LoadTimeouts};
use crate::locator::{self, TargetElement};
use crate::progress::ProgressCallback;
use crate::stabilize::{self, Settled, Stabilization};
use crate::{OgpError, Result, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    Idle,
    SessionOpen,
    DocumentLoaded,
    Stabilized,
    ElementLocated,
    Captured,
    Closed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Closed | PipelineState::Failed)
    }
}

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub template: PathBuf,
    pub selector: String,
    pub output: PathBuf,
    pub viewport: Viewport,
    pub timeouts: LoadTimeouts,
    pub stabilization: Stabilization,
}

impl From<&Config> for PipelineOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            template: cfg.template.clone(),
            selector: cfg.selector.clone(),
            output: cfg.output.clone(),
            viewport: cfg.viewport,
            timeouts: cfg.timeouts.into(),
            stabilization: cfg.stabilization.policy(),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub document: url::Url,
    pub target: TargetElement,
    pub capture: CaptureResult,
    pub settled: Settled,
    pub states: Vec<PipelineState>,
    pub elapsed: Duration,
}

pub struct Pipeline<E> {
    engine: E,
    options: PipelineOptions,
    progress: Option<ProgressCallback>,
}

struct Tracker {
    states: Vec<PipelineState>,
    progress: Option<ProgressCallback>,
}

impl Tracker {
    fn new(progress: Option<ProgressCallback>) -> Self {
        Self {
            states: vec![PipelineState::Idle],
            progress,
        }
    }

    fn current(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    fn advance(&mut self, next: PipelineState, message: &str) {
        debug_assert!(!self.current().is_terminal(), "no transitions out of a terminal state");
        info!(state = ?next, "{message}");
        self.states.push(next);
        if let Some(cb) = &self.progress {
            cb(next, message);
        }
    }

    fn fail(&mut self, err: &OgpError) {
        let message = format!("{} failed: {err}", err.stage());
        self.advance(PipelineState::Failed, &message);
    }
}

struct Stages {
    document: url::Url,
    settled: Settled,
    target: TargetElement,
    capture: CaptureResult,
}

impl<E: RenderEngine> Pipeline<E> {
    pub fn new(engine: E, options: PipelineOptions) -> Self {
        Self {
            engine,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs every stage once. The session is closed before this returns,
    /// whatever the outcome.
    pub async fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut tracker = Tracker::new(self.progress.clone());

        let mut session = match self.engine.open(self.options.viewport).await {
            Ok(session) => session,
            Err(err) => {
                tracker.fail(&err);
                return Err(err);
            }
        };
        tracker.advance(
            PipelineState::SessionOpen,
            &format!("Rendering session open ({})", session.viewport()),
        );

        let outcome = self.run_stages(&mut session, &mut tracker).await;
        if let Err(err) = &outcome {
            tracker.fail(err);
        }

        let closed = session.close().await;
        let stages = match outcome {
            Ok(stages) => stages,
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "session teardown failed after stage error");
                }
                return Err(err);
            }
        };
        if let Err(close_err) = closed {
            warn!(error = %close_err, "session teardown failed after capture");
        }
        tracker.advance(PipelineState::Closed, "Rendering session closed");

        Ok(PipelineReport {
            document: stages.document,
            target: stages.target,
            capture: stages.capture,
            settled: stages.settled,
            states: tracker.states,
            elapsed: start.elapsed(),
        })
    }

    async fn run_stages(&self, session: &mut E::Session, tracker: &mut Tracker) -> Result<Stages> {
        let opts = &self.options;

        let document = loader::resolve_document_url(&opts.template)?;
        loader::load(session, &document, opts.timeouts).await?;
        tracker.advance(
            PipelineState::DocumentLoaded,
            &format!("Loaded {document} (network idle)"),
        );

        let settled = stabilize::wait(session, opts.stabilization).await;
        tracker.advance(PipelineState::Stabilized, &format!("Page settled ({settled:?})"));

        let target = locator::locate(session, &opts.selector).await?;
        tracker.advance(
            PipelineState::ElementLocated,
            &format!(
                "Located '{}' ({}x{})",
                target.selector, target.bounds.width, target.bounds.height
            ),
        );

        let capture = capture::capture(session, &target, &opts.output).await?;
        tracker.advance(
            PipelineState::Captured,
            &format!(
                "Captured {}x{} to {}",
                capture.width,
                capture.height,
                capture.path.display()
            ),
        );

        Ok(Stages {
            document,
            settled,
            target,
            capture,
        })
    }
}
