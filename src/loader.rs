//! Document loading: local template path to an idle page.

use std::path::Path;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::browser::{LoadState, RenderSession};
use crate::{OgpError, Result};

/// Default timeout for page navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for waiting for network idle state.
pub const DEFAULT_NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTimeouts {
    pub navigation: Duration,
    pub network_idle: Duration,
}

impl Default for LoadTimeouts {
    fn default() -> Self {
        Self {
            navigation: DEFAULT_NAVIGATION_TIMEOUT,
            network_idle: DEFAULT_NETWORK_IDLE_TIMEOUT,
        }
    }
}

/// Turns a template path into an absolute `file://` URL.
///
/// Relative paths resolve against the current working directory. The file
/// must exist and be a regular file.
pub fn resolve_document_url(path: &Path) -> Result<Url> {
    let canonical = path.canonicalize().map_err(|e| {
        OgpError::DocumentLoadFailed(format!("Template not found: {} ({e})", path.display()))
    })?;
    if !canonical.is_file() {
        return Err(OgpError::DocumentLoadFailed(format!(
            "Template is not a file: {}",
            canonical.display()
        )));
    }
    Url::from_file_path(&canonical).map_err(|_| {
        OgpError::DocumentLoadFailed(format!(
            "Template path cannot be expressed as a file URL: {}",
            canonical.display()
        ))
    })
}

/// Navigates to `url` and blocks until the page is network-idle.
pub async fn load<S>(session: &mut S, url: &Url, timeouts: LoadTimeouts) -> Result<()>
where
    S: RenderSession + ?Sized,
{
    debug!(%url, "navigating");
    match timeout(timeouts.navigation, session.goto(url)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(OgpError::DocumentLoadFailed(format!(
                "Navigation to {url} timed out after {:?}",
                timeouts.navigation
            )))
        }
    }

    debug!("waiting for network idle");
    match timeout(timeouts.network_idle, session.wait_for_network_idle()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(OgpError::DocumentLoadFailed(format!(
                "Network idle timed out after {:?} for {url}",
                timeouts.network_idle
            )))
        }
    }

    if session.load_state() != LoadState::Idle {
        return Err(OgpError::DocumentLoadFailed(format!(
            "Page did not reach idle state for {url}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeEngine, Fault};
    use crate::browser::RenderEngine;
    use crate::Viewport;
    use tempfile::TempDir;

    fn short_timeouts() -> LoadTimeouts {
        LoadTimeouts {
            navigation: Duration::from_millis(50),
            network_idle: Duration::from_millis(50),
        }
    }

    fn template(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("og.html");
        std::fs::write(&path, "<div class=\"og-image\"></div>").unwrap();
        path
    }

    #[test]
    fn resolves_existing_file_to_absolute_file_url() {
        let dir = TempDir::new().unwrap();
        let path = template(&dir);
        let url = resolve_document_url(&path).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/og.html"));
        assert_eq!(url.to_file_path().unwrap(), path.canonicalize().unwrap());
    }

    #[test]
    fn missing_template_is_a_load_failure() {
        let err = resolve_document_url(Path::new("no/such/template.html")).unwrap_err();
        assert!(matches!(err, OgpError::DocumentLoadFailed(_)));
        assert!(err.to_string().contains("no/such/template.html"));
    }

    #[test]
    fn directory_is_not_a_template() {
        let dir = TempDir::new().unwrap();
        let err = resolve_document_url(dir.path()).unwrap_err();
        assert!(matches!(err, OgpError::DocumentLoadFailed(_)));
    }

    #[tokio::test]
    async fn load_reaches_idle() {
        let dir = TempDir::new().unwrap();
        let url = resolve_document_url(&template(&dir)).unwrap();
        let mut session = FakeEngine::default().open(Viewport::default()).await.unwrap();

        load(&mut session, &url, short_timeouts()).await.unwrap();

        assert_eq!(session.load_state(), LoadState::Idle);
        assert_eq!(session.url(), Some(&url));
    }

    #[tokio::test]
    async fn navigation_timeout_is_a_load_failure() {
        let dir = TempDir::new().unwrap();
        let url = resolve_document_url(&template(&dir)).unwrap();
        let engine = FakeEngine::default().failing(Fault::HangNavigate);
        let mut session = engine.open(Viewport::default()).await.unwrap();

        let err = load(&mut session, &url, short_timeouts()).await.unwrap_err();
        match err {
            OgpError::DocumentLoadFailed(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected DocumentLoadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn network_idle_timeout_is_a_load_failure() {
        let dir = TempDir::new().unwrap();
        let url = resolve_document_url(&template(&dir)).unwrap();
        let engine = FakeEngine::default().failing(Fault::HangIdle);
        let mut session = engine.open(Viewport::default()).await.unwrap();

        let err = load(&mut session, &url, short_timeouts()).await.unwrap_err();
        match err {
            OgpError::DocumentLoadFailed(msg) => {
                assert!(msg.contains("Network idle timed out"), "{msg}")
            }
            other => panic!("expected DocumentLoadFailed, got {other:?}"),
        }
        assert_eq!(session.load_state(), LoadState::Pending);
    }
}
