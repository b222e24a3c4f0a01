//! Exit codes and structured error reporting.

use crate::render::RenderError;
use serde::Serialize;

/// Process exit codes.
///
/// - 0: Success (artifact resolved and handed to the viewer)
/// - 1: General error (configuration, viewer, anything unclassified)
/// - 2: Source document unreadable
/// - 3: Render cache store unavailable or not writable
/// - 4: Converter could not be run or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Artifact resolved.
    Success = 0,
    /// Unexpected or unclassified failure.
    GeneralError = 1,
    /// The source document could not be read.
    SourceError = 2,
    /// The store could not be opened or written.
    StoreError = 3,
    /// The converter could not be run or reported failure.
    ConverterError = 4,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MDV000",
            Self::GeneralError => "MDV001",
            Self::SourceError => "MDV002",
            Self::StoreError => "MDV003",
            Self::ConverterError => "MDV004",
        }
    }

    /// Exit code for an application error.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(render) = err.downcast_ref::<RenderError>() {
            return match render {
                RenderError::Source(_) => Self::SourceError,
                RenderError::Store(_) => Self::StoreError,
                RenderError::Convert(_) => Self::ConverterError,
                RenderError::OutputDir { .. } => Self::GeneralError,
            };
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "MDV002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Messages of the underlying causes, outermost first
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
