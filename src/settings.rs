use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use ogp_lib::{Config, OgpError};
use tracing::info;

use crate::cli::Cli;

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct GenerateFlagSources {
    pub template: bool,
    pub selector: bool,
    pub output: bool,
    pub viewport: bool,
    pub settle_delay: bool,
    pub nav_timeout: bool,
    pub network_idle_timeout: bool,
}

impl GenerateFlagSources {
    pub fn from_args(args: &[OsString]) -> Self {
        Self {
            template: flag_present(args, "--template"),
            selector: flag_present(args, "--selector"),
            output: flag_present(args, "--output"),
            viewport: flag_present(args, "--viewport"),
            settle_delay: flag_present(args, "--settle-delay"),
            nav_timeout: flag_present(args, "--nav-timeout"),
            network_idle_timeout: flag_present(args, "--network-idle-timeout"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
///
/// Arguments that are not valid UTF-8 (e.g. raw path values) never name a flag.
pub fn flag_present(args: &[OsString], flag: &str) -> bool {
    let inline = format!("{flag}=");
    args.iter()
        .filter_map(|arg| arg.to_str())
        .any(|arg| arg == flag || arg.starts_with(&inline))
}

/// Merge CLI arguments into the loaded config, preferring CLI when flags are present.
///
/// Switches (`--headed`, `--no-sandbox`, `--wait-for-fonts`) only ever turn a
/// setting on; leaving them off keeps whatever the config says.
pub fn resolve_generate_config(
    cli: &Cli,
    mut config: Config,
    flags: &GenerateFlagSources,
) -> Result<Config, OgpError> {
    if flags.template {
        config.template = cli.template.clone();
    }
    if flags.selector {
        config.selector = cli.selector.clone();
    }
    if flags.output {
        config.output = cli.output.clone();
    }
    if flags.viewport {
        config.viewport = cli.viewport;
    }
    if flags.settle_delay {
        config.stabilization.delay = Duration::from_millis(cli.settle_delay);
    }
    if flags.nav_timeout {
        config.timeouts.navigation = Duration::from_secs(cli.nav_timeout);
    }
    if flags.network_idle_timeout {
        config.timeouts.network_idle = Duration::from_secs(cli.network_idle_timeout);
    }
    if cli.wait_for_fonts {
        config.stabilization.wait_for_fonts = true;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.no_sandbox {
        config.browser.no_sandbox = true;
    }
    if let Some(exe) = &cli.chrome_executable {
        config.browser.chrome_executable = Some(exe.clone());
    }

    config.validate().map_err(OgpError::Config)?;
    Ok(config)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &Config, config_source: Option<&Path>) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let settle = if config.stabilization.wait_for_fonts {
        format!(
            "fonts-ready (timeout {}ms, fallback {}ms)",
            config.stabilization.font_timeout.as_millis(),
            config.stabilization.delay.as_millis()
        )
    } else {
        format!("delay {}ms", config.stabilization.delay.as_millis())
    };
    format!(
        "Effective config [{source}]: template={}, selector={}, output={}, viewport={}, settle={settle}, timeouts: nav={}s, network-idle={}s, headless={}, no-sandbox={}",
        config.template.display(),
        config.selector,
        config.output.display(),
        config.viewport,
        config.timeouts.navigation.as_secs(),
        config.timeouts.network_idle.as_secs(),
        config.browser.headless,
        config.browser.no_sandbox,
    )
}

/// Log effective config (verbose mode).
pub fn log_effective_config(config: &Config, config_source: Option<&Path>) {
    info!("{}", format_effective_config(config, config_source));
}
