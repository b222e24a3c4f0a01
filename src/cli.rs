//! Command-line interface definitions for mdv.
//!
//! # Example
//!
//! ```bash
//! # Render and open README.md, reusing a cached render when unchanged
//! mdv README.md
//!
//! # Force a fresh render with a specific stylesheet
//! mdv --force --css ~/styles/github.css README.md
//!
//! # Print the artifact path only (for scripts)
//! mdv --no-open notes.md
//! ```

use clap::Parser;
use std::path::PathBuf;

/// Preview Markdown documents as HTML.
///
/// mdv converts a document with pandoc, caches the result by content hash,
/// and opens it in the default viewer. Unchanged documents are never
/// converted twice.
#[derive(Debug, Parser)]
#[command(name = "mdv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Markdown document to preview
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Stylesheet used to format the output HTML
    #[arg(long = "css", value_name = "PATH")]
    pub stylesheet: Option<PathBuf>,

    /// Re-render even if a cached artifact exists
    #[arg(short, long)]
    pub force: bool,

    /// Config file (default: <config dir>/mdv/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory of the render cache store
    #[arg(long, value_name = "PATH")]
    pub store_dir: Option<PathBuf>,

    /// Print the artifact path without launching a viewer
    #[arg(long)]
    pub no_open: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}
