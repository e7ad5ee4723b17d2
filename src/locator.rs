use serde::Serialize;
use tracing::{debug, warn};

use crate::browser::{BoundingBox, RenderSession};
use crate::{OgpError, Result};

/// The element chosen for capture. Only valid while its session is open.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetElement {
    pub selector: String,
    /// Total matches; the first in document order is the target.
    pub matches: usize,
    pub bounds: BoundingBox,
}

/// Resolves the first element matching `selector`.
pub async fn locate<S>(session: &mut S, selector: &str) -> Result<TargetElement>
where
    S: RenderSession + ?Sized,
{
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(OgpError::element_not_found(selector));
    }

    let query = session.query(selector).await?;
    let bounds = match (query.matches, query.first) {
        (0, _) | (_, None) => return Err(OgpError::element_not_found(selector)),
        (_, Some(bounds)) => bounds,
    };
    if query.matches > 1 {
        warn!(
            selector,
            matches = query.matches,
            "selector matched several elements; capturing the first"
        );
    }
    debug!(selector, ?bounds, "element located");

    Ok(TargetElement {
        selector: selector.to_string(),
        matches: query.matches,
        bounds,
    })
}
