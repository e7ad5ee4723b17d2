use crate::error::ErrorPayload;
use crate::pipeline::{PipelineReport, PipelineState};
use crate::Viewport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema version for output payloads.
pub const OGP_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum OgpOutput {
    Generate(GenerateOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
    pub version: String,
    pub document: String,
    pub selector: String,
    pub matches: usize,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub viewport: Viewport,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
}

impl GenerateOutput {
    pub fn from_report(report: &PipelineReport, viewport: Viewport) -> Self {
        Self {
            version: OGP_OUTPUT_VERSION.to_string(),
            document: report.document.to_string(),
            selector: report.target.selector.clone(),
            matches: report.target.matches,
            output_path: report.capture.path.clone(),
            width: report.capture.width,
            height: report.capture.height,
            bytes: report.capture.bytes,
            viewport,
            elapsed_ms: report.elapsed.as_millis() as u64,
            states: report.states.iter().map(state_name).collect(),
        }
    }
}

fn state_name(state: &PipelineState) -> String {
    serde_json::to_value(state)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{state:?}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    pub error: ErrorPayload,
}
