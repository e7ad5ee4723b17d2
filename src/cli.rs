use clap::{Parser, ValueEnum};
use ogp_lib::config::{DEFAULT_OUTPUT, DEFAULT_SELECTOR, DEFAULT_TEMPLATE};
use ogp_lib::Viewport;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "generate-preview-image")]
#[command(
    version,
    about = "Render an HTML template in headless Chromium and capture one element as an Open Graph PNG",
    long_about = "generate-preview-image\n\nLoads a local HTML template, waits for the network to go idle and the page to settle, then captures the element matching --selector and writes it as an opaque PNG.\n\nSettings can also come from a TOML config file (--config, or ./ogp.toml when present); flags given on the command line win."
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "PATH",
        default_value = DEFAULT_TEMPLATE,
        help = "HTML template to render (relative paths resolve from the working directory)"
    )]
    pub template: PathBuf,

    #[arg(
        long,
        value_name = "CSS",
        default_value = DEFAULT_SELECTOR,
        help = "CSS selector of the element to capture; the first match wins"
    )]
    pub selector: String,

    #[arg(
        long,
        value_name = "PATH",
        default_value = DEFAULT_OUTPUT,
        help = "Destination PNG; an existing file is replaced"
    )]
    pub output: PathBuf,

    #[arg(
        long,
        default_value = "1200x630",
        help = "Viewport dimensions (WIDTHxHEIGHT)"
    )]
    pub viewport: Viewport,

    #[arg(
        long,
        value_name = "MS",
        default_value = "1000",
        help = "Settle delay after network idle, in milliseconds"
    )]
    pub settle_delay: u64,

    #[arg(
        long,
        help = "Wait for document.fonts.ready instead of the fixed delay (falls back to the delay if unsupported)"
    )]
    pub wait_for_fonts: bool,

    #[arg(
        long,
        value_name = "SECS",
        default_value = "30",
        help = "Navigation timeout in seconds"
    )]
    pub nav_timeout: u64,

    #[arg(
        long,
        value_name = "SECS",
        default_value = "10",
        help = "Network idle wait timeout in seconds"
    )]
    pub network_idle_timeout: u64,

    #[arg(long, value_name = "PATH", help = "Chrome/Chromium binary to launch")]
    pub chrome_executable: Option<PathBuf>,

    #[arg(long, help = "Show the browser window instead of running headless")]
    pub headed: bool,

    #[arg(long, help = "Disable the Chromium sandbox (needed in most containers)")]
    pub no_sandbox: bool,

    #[arg(long, value_enum, default_value = "pretty", help = "Output format")]
    pub format: OutputFormat,

    #[arg(
        long,
        value_name = "PATH",
        help = "Optional config file (TOML); CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, OutputFormat};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn defaults_need_no_arguments() {
        let cli = Cli::try_parse_from(["generate-preview-image"]).expect("parse defaults");

        assert_eq!(cli.template, PathBuf::from("og-image-generator.html"));
        assert_eq!(cli.selector, ".og-image");
        assert_eq!(cli.output, PathBuf::from("public/og-image.png"));
        assert_eq!(cli.viewport.width, 1200);
        assert_eq!(cli.viewport.height, 630);
        assert_eq!(cli.settle_delay, 1000);
        assert_eq!(cli.nav_timeout, 30);
        assert_eq!(cli.network_idle_timeout, 10);
        assert!(!cli.wait_for_fonts);
        assert!(!cli.headed);
        assert!(!cli.no_sandbox);
        assert!(cli.chrome_executable.is_none());
        assert_eq!(cli.format, OutputFormat::Pretty);
        assert!(!cli.verbose);
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = Cli::try_parse_from([
            "generate-preview-image",
            "--template",
            "site/card.html",
            "--selector",
            "#card",
            "--output",
            "out/card.png",
            "--viewport",
            "800x418",
            "--settle-delay",
            "250",
            "--wait-for-fonts",
            "--nav-timeout",
            "5",
            "--network-idle-timeout",
            "3",
            "--chrome-executable",
            "/opt/chrome/chrome",
            "--headed",
            "--no-sandbox",
            "--format",
            "json",
            "--config",
            "ogp.toml",
            "--verbose",
        ])
        .expect("parse overrides");

        assert_eq!(cli.template, PathBuf::from("site/card.html"));
        assert_eq!(cli.selector, "#card");
        assert_eq!(cli.output, PathBuf::from("out/card.png"));
        assert_eq!((cli.viewport.width, cli.viewport.height), (800, 418));
        assert_eq!(cli.settle_delay, 250);
        assert!(cli.wait_for_fonts);
        assert_eq!(cli.nav_timeout, 5);
        assert_eq!(cli.network_idle_timeout, 3);
        assert_eq!(cli.chrome_executable, Some(PathBuf::from("/opt/chrome/chrome")));
        assert!(cli.headed);
        assert!(cli.no_sandbox);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("ogp.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn malformed_viewport_is_rejected() {
        assert!(Cli::try_parse_from(["generate-preview-image", "--viewport", "wide"]).is_err());
        assert!(Cli::try_parse_from(["generate-preview-image", "--viewport", "0x630"]).is_err());
    }
}
