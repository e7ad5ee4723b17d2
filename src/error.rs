use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OgpError {
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Document load failed: {0}")]
    DocumentLoadFailed(String),

    #[error("Element not found: no element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("Invalid selector: '{selector}' is not a valid CSS selector")]
    InvalidSelector { selector: String },

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Write failed for {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Setup,
    Session,
    Load,
    Locate,
    Capture,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Session => "rendering session",
            Stage::Load => "document load",
            Stage::Locate => "element lookup",
            Stage::Capture => "capture",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

impl OgpError {
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        OgpError::ElementNotFound {
            selector: selector.into(),
        }
    }

    pub fn write_failed(path: &std::path::Path, source: std::io::Error) -> Self {
        OgpError::WriteFailed {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            OgpError::EngineUnavailable(_) => Stage::Session,
            OgpError::DocumentLoadFailed(_) => Stage::Load,
            OgpError::ElementNotFound { .. } | OgpError::InvalidSelector { .. } => Stage::Locate,
            OgpError::CaptureFailed(_) => Stage::Capture,
            OgpError::WriteFailed { .. } => Stage::Write,
            OgpError::Config(_) | OgpError::Io(_) => Stage::Setup,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            OgpError::EngineUnavailable(msg) => {
                if msg.to_ascii_lowercase().contains("sandbox") {
                    "Chromium refused to start its sandbox; rerun with --no-sandbox inside containers."
                } else {
                    "Install Chrome/Chromium or point --chrome-executable at an existing binary."
                }
            }
            OgpError::DocumentLoadFailed(msg) => {
                if msg.to_ascii_lowercase().contains("timeout")
                    || msg.to_ascii_lowercase().contains("timed out")
                {
                    "Try increasing --nav-timeout/--network-idle-timeout or remove blocking requests from the template."
                } else {
                    "Verify --template points at an existing HTML file; relative paths resolve from the working directory."
                }
            }
            OgpError::ElementNotFound { .. } => {
                "Check that the template contains an element matching --selector (e.g., <div class=\"og-image\">)."
            }
            OgpError::InvalidSelector { .. } => {
                "Fix the --selector syntax (e.g., .og-image or #card); it must be accepted by document.querySelectorAll."
            }
            OgpError::CaptureFailed(_) => {
                "Make sure the target element is visible with a non-zero size (not display:none)."
            }
            OgpError::WriteFailed { .. } => {
                "Check that the output directory exists or can be created and is writable."
            }
            OgpError::Config(_) => {
                "Check flags/config values (e.g., --viewport WIDTHxHEIGHT, durations like \"1s\")."
            }
            OgpError::Io(_) => "Check file paths/permissions.",
        };
        ErrorPayload::new(self.stage(), self.to_string(), remediation)
    }
}

pub type Result<T> = std::result::Result<T, OgpError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(stage: Stage, message: String, remediation: impl Into<String>) -> Self {
        Self {
            stage,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
