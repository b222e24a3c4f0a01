//! Hand-off of a rendered artifact to the user's viewer.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Platform command that opens a file with its default application.
#[cfg(target_os = "macos")]
pub const DEFAULT_VIEWER: &str = "open";
/// Platform command that opens a file with its default application.
#[cfg(target_os = "windows")]
pub const DEFAULT_VIEWER: &str = "explorer";
/// Platform command that opens a file with its default application.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub const DEFAULT_VIEWER: &str = "xdg-open";

/// Errors raised while launching the viewer.
#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    /// The viewer process could not be spawned.
    #[error("Failed to launch viewer '{program}' for {path}: {source}")]
    Launch {
        /// Viewer program
        program: String,
        /// Artifact that was to be opened
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Spawn `program <artifact>` and return without waiting for it.
pub fn open(program: &str, artifact: &Path) -> Result<(), ViewerError> {
    log::debug!("Opening {} with {}", artifact.display(), program);
    Command::new(program)
        .arg(artifact)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|source| ViewerError::Launch {
            program: program.to_string(),
            path: artifact.to_path_buf(),
            source,
        })
}
