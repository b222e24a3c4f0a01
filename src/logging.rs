//! Logging setup for mdv.
//!
//! Uses the `log` facade with an `env_logger` backend. The filter comes from,
//! in priority order:
//!
//! 1. `MDV_LOG`, then `RUST_LOG` (env_logger filter syntax)
//! 2. CLI flags: `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info, which reports cache hits and misses
//!
//! Logs go to stderr so stdout carries only the artifact path.

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Environment variables consulted for a log filter, first match wins.
const FILTER_VARS: [&str; 2] = ["MDV_LOG", "RUST_LOG"];

/// Initialize logging from CLI verbosity flags.
///
/// Call once at startup; `env_logger` panics on a second initialization.
pub fn init_logging(verbose: u8, quiet: bool, color: bool) {
    let mut builder = Builder::new();

    let env_filter = env_filter();
    match &env_filter {
        Some((_, filter)) => {
            builder.parse_filters(filter);
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }

    builder.write_style(if color {
        env_logger::WriteStyle::Auto
    } else {
        env_logger::WriteStyle::Never
    });

    let detailed = verbose >= 1;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if detailed {
            let timestamp = buf.timestamp_millis();
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or("mdv"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    builder.init();

    if let Some((var, filter)) = env_filter {
        log::trace!("Log filter from {}: {}", var, filter);
    }
}

fn env_filter() -> Option<(&'static str, String)> {
    FILTER_VARS
        .iter()
        .find_map(|var| env::var(var).ok().map(|value| (*var, value)))
        .filter(|(_, value)| !value.trim().is_empty())
}

/// Log level for the given CLI flags; `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
