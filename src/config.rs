use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::EngineOptions;
use crate::loader::LoadTimeouts;
use crate::stabilize::Stabilization;
use crate::{OgpError, Result, Viewport};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "ogp.toml";
pub const DEFAULT_TEMPLATE: &str = "og-image-generator.html";
pub const DEFAULT_SELECTOR: &str = ".og-image";
pub const DEFAULT_OUTPUT: &str = "public/og-image.png";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub template: PathBuf,
    pub selector: String,
    pub output: PathBuf,
    pub viewport: Viewport,
    pub timeouts: Timeouts,
    pub stabilization: StabilizationConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    #[serde(with = "humantime_serde")]
    pub network_idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            network_idle: Duration::from_secs(10),
        }
    }
}

impl From<Timeouts> for LoadTimeouts {
    fn from(t: Timeouts) -> Self {
        LoadTimeouts {
            navigation: t.navigation,
            network_idle: t.network_idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StabilizationConfig {
    /// Fixed settle delay after network idle; also the fallback for the font probe.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    pub wait_for_fonts: bool,
    #[serde(with = "humantime_serde")]
    pub font_timeout: Duration,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            wait_for_fonts: false,
            font_timeout: Duration::from_secs(5),
        }
    }
}

impl StabilizationConfig {
    pub fn policy(&self) -> Stabilization {
        if self.wait_for_fonts {
            Stabilization::FontsReady {
                timeout: self.font_timeout,
                fallback: self.delay,
            }
        } else {
            Stabilization::Fixed { delay: self.delay }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            no_sandbox: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            chrome_executable: self.chrome_executable.clone(),
            headless: self.headless,
            no_sandbox: self.no_sandbox,
            request_timeout: self.request_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template: PathBuf::from(DEFAULT_TEMPLATE),
            selector: DEFAULT_SELECTOR.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
            stabilization: StabilizationConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Config {
    /// The file [`Config::load`] reads: the explicit path, else `./ogp.toml`
    /// when present.
    pub fn locate_file(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.is_file().then_some(local)
            }
        }
    }

    /// Loads config from an explicit path, `./ogp.toml` when present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::locate_file(path) else {
            return Ok(Config::default());
        };
        let raw = fs::read_to_string(&path).map_err(|e| {
            OgpError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| OgpError::Config(format!("Invalid config ({}): {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        let cfg: Config = toml::from_str(raw).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.selector.trim().is_empty() {
            return Err("selector must not be empty".to_string());
        }
        if self.template.as_os_str().is_empty() {
            return Err("template path must not be empty".to_string());
        }
        if self.output.as_os_str().is_empty() {
            return Err("output path must not be empty".to_string());
        }
        if self.timeouts.navigation.is_zero() || self.timeouts.network_idle.is_zero() {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}
