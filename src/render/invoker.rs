//! External converter invocation.
//!
//! The converter is an opaque program (pandoc by convention) that reads a
//! source document and writes a self-contained HTML file to a given path.
//! [`PandocConverter`] builds its argument list, runs it to completion and
//! checks that it actually produced something.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Conventional converter program name.
pub const DEFAULT_CONVERTER: &str = "pandoc";

/// Maximum number of stderr bytes kept in a [`ConvertError::Failed`].
const STDERR_LIMIT: usize = 4096;

/// One conversion: read `source`, write `output`.
#[derive(Debug, Clone, Copy)]
pub struct ConversionJob<'a> {
    /// Source document, passed as the final positional argument.
    pub source: &'a Path,
    /// Where the converter must write the artifact.
    pub output: &'a Path,
    /// Stylesheet to embed, if one is configured.
    pub stylesheet: Option<&'a Path>,
}

/// Errors raised while running the converter.
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    /// The converter program could not be found.
    #[error("Converter '{program}' not found: {source}")]
    NotFound {
        /// Program name or path
        program: String,
        /// Lookup failure
        #[source]
        source: which::Error,
    },

    /// The converter process could not be started.
    #[error("Failed to launch converter {program}: {source}")]
    Launch {
        /// Resolved program path
        program: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but exited unsuccessfully.
    #[error("Converter exited with {status}: {stderr}")]
    Failed {
        /// Exit status of the process
        status: ExitStatus,
        /// Trimmed tail of the captured stderr
        stderr: String,
    },

    /// The converter exited successfully but left no usable artifact.
    #[error("Converter produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Anything that can turn a [`ConversionJob`] into an artifact on disk.
pub trait Converter {
    /// Run the conversion synchronously.
    ///
    /// On `Ok(())` the artifact at `job.output` is complete.
    fn convert(&self, job: &ConversionJob<'_>) -> Result<(), ConvertError>;
}

impl<C: Converter + ?Sized> Converter for &C {
    fn convert(&self, job: &ConversionJob<'_>) -> Result<(), ConvertError> {
        (**self).convert(job)
    }
}

/// Converter backed by an external pandoc-compatible program.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
    leading_args: Vec<String>,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERTER)
    }
}

impl PandocConverter {
    /// Converter running `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the standard ones, e.g. `--from gfm`.
    #[must_use]
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Full argument list for `job`, leading arguments included.
    #[must_use]
    pub fn command_args(&self, job: &ConversionJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        args.extend(build_args(job));
        args
    }
}

impl Converter for PandocConverter {
    fn convert(&self, job: &ConversionJob<'_>) -> Result<(), ConvertError> {
        let program = which::which(&self.program).map_err(|source| ConvertError::NotFound {
            program: self.program.clone(),
            source,
        })?;
        let args = self.command_args(job);
        log::debug!("Running {} {:?}", program.display(), args);

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ConvertError::Launch {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }
        if !output.stderr.is_empty() {
            log::debug!("Converter stderr: {}", stderr_tail(&output.stderr));
        }

        verify_output(job.output)
    }
}

/// Build the converter arguments for `job`.
///
/// Layout: `-o <output> --self-contained --quiet [--css <stylesheet>] <source>`.
/// A stylesheet that does not exist on disk is skipped with a warning.
#[must_use]
pub fn build_args(job: &ConversionJob<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-o".into(),
        job.output.as_os_str().to_owned(),
        "--self-contained".into(),
        "--quiet".into(),
    ];

    match job.stylesheet {
        Some(sheet) if sheet.is_file() => {
            log::info!("Using stylesheet: {}", sheet.display());
            args.push("--css".into());
            args.push(sheet.as_os_str().to_owned());
        }
        Some(sheet) => {
            log::warn!(
                "Stylesheet '{}' not found, rendering without it",
                sheet.display()
            );
        }
        None => {}
    }

    args.push(job.source.as_os_str().to_owned());
    args
}

fn verify_output(path: &Path) -> Result<(), ConvertError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ConvertError::MissingOutput(path.to_path_buf())),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_LIMIT);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
