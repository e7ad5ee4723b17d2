//! Settling time between network idle and capture.
//!
//! Web fonts can finish shaping after the network goes quiet, so the page is
//! given extra time before anything is measured. The default is a fixed
//! delay; [`Stabilization::FontsReady`] probes `document.fonts.ready` first
//! and only sleeps when the probe cannot answer in time.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::browser::RenderSession;

/// Default settle delay after network idle.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stabilization {
    /// Sleep for a fixed duration.
    Fixed { delay: Duration },
    /// Await font loading up to `timeout`, sleeping `fallback` if that fails.
    FontsReady { timeout: Duration, fallback: Duration },
}

impl Default for Stabilization {
    fn default() -> Self {
        Stabilization::Fixed {
            delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// How the page was judged settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Delay(Duration),
    FontsReady,
    Fallback(Duration),
}

/// Waits according to `policy`. Never fails the run.
pub async fn wait<S>(session: &mut S, policy: Stabilization) -> Settled
where
    S: RenderSession + ?Sized,
{
    match policy {
        Stabilization::Fixed { delay } => {
            debug!(?delay, "settling");
            sleep(delay).await;
            Settled::Delay(delay)
        }
        Stabilization::FontsReady {
            timeout: probe_timeout,
            fallback,
        } => {
            match timeout(probe_timeout, session.fonts_ready()).await {
                Ok(Ok(true)) => {
                    debug!("document fonts ready");
                    return Settled::FontsReady;
                }
                Ok(Ok(false)) => debug!("page exposes no font loading API"),
                Ok(Err(err)) => warn!(error = %err, "font readiness probe failed"),
                Err(_) => warn!(timeout = ?probe_timeout, "font readiness probe timed out"),
            }
            sleep(fallback).await;
            Settled::Fallback(fallback)
        }
    }
}
