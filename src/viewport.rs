use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Width of the Open Graph card most platforms render without cropping.
pub const OG_IMAGE_WIDTH: u32 = 1200;
/// Height of the Open Graph card most platforms render without cropping.
pub const OG_IMAGE_HEIGHT: u32 = 630;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ViewportRepr", into = "ViewportRepr")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Builds a viewport, rejecting zero dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, ViewportParseError> {
        if width == 0 {
            return Err(ViewportParseError::ZeroWidth);
        }
        if height == 0 {
            return Err(ViewportParseError::ZeroHeight);
        }
        Ok(Self { width, height })
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: OG_IMAGE_WIDTH,
            height: OG_IMAGE_HEIGHT,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewportParseError {
    #[error("Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1200x630)")]
    InvalidFormat,
    #[error("Invalid width: {0}")]
    InvalidWidth(String),
    #[error("Invalid height: {0}")]
    InvalidHeight(String),
    #[error("Width must be positive")]
    ZeroWidth,
    #[error("Height must be positive")]
    ZeroHeight,
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('x').collect();
        if parts.len() != 2 {
            return Err(ViewportParseError::InvalidFormat);
        }

        let width: u32 = parts[0]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidWidth(parts[0].to_string()))?;

        let height: u32 = parts[1]
            .trim()
            .parse()
            .map_err(|_| ViewportParseError::InvalidHeight(parts[1].to_string()))?;

        Viewport::new(width, height)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// Config files accept either "1200x630" or { width, height }.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ViewportRepr {
    Text(String),
    Dims { width: u32, height: u32 },
}

impl TryFrom<ViewportRepr> for Viewport {
    type Error = ViewportParseError;

    fn try_from(repr: ViewportRepr) -> Result<Self, Self::Error> {
        match repr {
            ViewportRepr::Text(text) => text.parse(),
            ViewportRepr::Dims { width, height } => Viewport::new(width, height),
        }
    }
}

impl From<Viewport> for ViewportRepr {
    fn from(vp: Viewport) -> Self {
        ViewportRepr::Dims {
            width: vp.width,
            height: vp.height,
        }
    }
}
