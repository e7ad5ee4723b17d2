mod cli;
mod formatting;
mod settings;

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use ogp_lib::{
    ChromiumEngine, Config, GenerateOutput, OgpError, OgpOutput, Pipeline, PipelineOptions,
    PipelineState, ProgressCallback,
};
use tracing_subscriber::EnvFilter;

use crate::formatting::{render_error, write_output};
use crate::settings::{log_effective_config, resolve_generate_config, GenerateFlagSources};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "ogp_lib=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> ExitCode {
    let raw_args: Vec<OsString> = std::env::args_os().collect();
    let args = cli::parse();
    let format = args.format;
    init_tracing(args.verbose);

    let config_source = Config::locate_file(args.config.as_deref());
    let config = match Config::load(config_source.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format),
    };
    let flag_sources = GenerateFlagSources::from_args(&raw_args);
    let config = match resolve_generate_config(&args, config, &flag_sources) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format),
    };
    if args.verbose {
        log_effective_config(&config, config_source.as_deref());
    }

    let engine = ChromiumEngine::new(config.browser.engine_options());
    let mut pipeline = Pipeline::new(engine, PipelineOptions::from(&config));
    if args.verbose {
        let progress: ProgressCallback = Arc::new(|state: PipelineState, msg: &str| {
            eprintln!("[{state:?}] {msg}");
        });
        pipeline = pipeline.with_progress(progress);
    }

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(err) => return render_error(err, format),
    };

    let body = OgpOutput::Generate(GenerateOutput::from_report(&report, config.viewport));
    if let Err(err) = write_output(&body, format) {
        return render_error(OgpError::Io(err.into()), format);
    }
    ExitCode::SUCCESS
}
