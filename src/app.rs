//! Application entry point: wires CLI, configuration, cache and viewer.

use crate::cli::Cli;
use crate::config::{Config, Settings};
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::render::{CacheController, PandocConverter, RenderOutcome, RenderRequest};
use crate::viewer;
use anyhow::{Context, Result};
use std::io::Write;

/// Run mdv for parsed CLI arguments.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet, !cli.no_color);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    let settings = config.resolve()?;
    log::debug!("Store directory: {}", settings.cache.store_dir.display());

    let outcome = render(&cli, &settings)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", outcome.artifact.display()).context("Failed to write to stdout")?;

    if !cli.no_open {
        viewer::open(&settings.viewer, &outcome.artifact)?;
    }
    Ok(ExitCode::Success)
}

/// Resolve the artifact for `cli.source` through the render cache.
pub fn render(cli: &Cli, settings: &Settings) -> Result<RenderOutcome> {
    let converter = PandocConverter::new(settings.converter.clone())
        .with_leading_args(settings.converter_args.clone());
    let controller = CacheController::new(settings.cache.clone(), converter);

    let request = RenderRequest::new(&cli.source)
        .with_force(cli.force)
        .with_stylesheet(settings.stylesheet.clone());

    controller
        .render(&request)
        .with_context(|| format!("Failed to render {}", cli.source.display()))
}
