use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use ogp_lib::{ErrorOutput, OgpError, OgpOutput, OGP_OUTPUT_VERSION};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(body: &OgpOutput, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(body)?),
        OutputFormat::Pretty => {
            let colorize = io::stdout().is_terminal();
            print!("{}", format_pretty(body, colorize));
        }
    }
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: OgpError, format: OutputFormat) -> ExitCode {
    let payload = OgpOutput::Error(ErrorOutput {
        version: OGP_OUTPUT_VERSION.to_string(),
        error: err.to_payload(),
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            println!("{content}");
        }
        OutputFormat::Pretty => {
            let colorize = io::stderr().is_terminal();
            eprint!("{}", format_pretty(&payload, colorize));
        }
    };

    ExitCode::from(2)
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &OgpOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        OgpOutput::Generate(out) => {
            let header = color("[OK]", "32", colorize);
            writeln!(
                buf,
                "{} OG image generated at {} ({}x{})",
                header,
                out.output_path.display(),
                out.width,
                out.height
            )
            .ok();
            if out.matches > 1 {
                let note = color("note:", "33", colorize);
                writeln!(
                    buf,
                    "{} selector '{}' matched {} elements; captured the first",
                    note, out.selector, out.matches
                )
                .ok();
            }
        }
        OgpOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}: {}", header, out.error.stage, out.error.message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}
