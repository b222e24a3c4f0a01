//! Cache-aware rendering.
//!
//! [`CacheController::render`] walks one request through
//! `fingerprint -> open store -> lookup -> (render -> put) -> close` and
//! returns where the artifact lives. The store is closed on every path out
//! of a request.

use crate::cache::{ArtifactStore, StoreError};
use crate::fingerprint::{fingerprint, Fingerprint, FingerprintError};
use crate::render::invoker::{ConversionJob, ConvertError, Converter};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of the per-render output directories.
const OUTPUT_DIR_PREFIX: &str = "mdv-";

/// Extension of rendered artifacts.
const ARTIFACT_EXTENSION: &str = "html";

/// One render invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Source document.
    pub source: PathBuf,
    /// Re-render even when a cached artifact exists.
    pub force: bool,
    /// Stylesheet handed to the converter, if any.
    pub stylesheet: Option<PathBuf>,
}

impl RenderRequest {
    /// Request for `source` with no stylesheet and no forcing.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            force: false,
            stylesheet: None,
        }
    }

    /// Set the force-refresh flag.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the stylesheet.
    #[must_use]
    pub fn with_stylesheet(mut self, stylesheet: Option<PathBuf>) -> Self {
        self.stylesheet = stylesheet;
        self
    }
}

/// How a request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the store, converter not run.
    Hit,
    /// No entry for this content; rendered.
    Miss,
    /// Rendered because the caller forced it.
    Forced,
    /// An entry existed but its artifact was gone; rendered again.
    Stale,
}

impl CacheStatus {
    /// Whether the converter ran for this request.
    #[must_use]
    pub fn rendered(self) -> bool {
        !matches!(self, Self::Hit)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::Miss => write!(f, "miss"),
            CacheStatus::Forced => write!(f, "forced"),
            CacheStatus::Stale => write!(f, "stale"),
        }
    }
}

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Absolute path of the artifact to show.
    pub artifact: PathBuf,
    /// Fingerprint of the source content.
    pub fingerprint: Fingerprint,
    /// Whether it came from the cache.
    pub status: CacheStatus,
}

/// Errors that abort a render request.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The source document could not be read.
    #[error(transparent)]
    Source(#[from] FingerprintError),

    /// The store could not be opened, read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The converter could not be run or failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// No output directory could be allocated for the artifact.
    #[error("Failed to allocate output directory under {path}: {source}")]
    OutputDir {
        /// Parent directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Settings the controller needs, resolved before it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Directory holding the artifact store.
    pub store_dir: PathBuf,
    /// Parent of per-render output directories; the system temp dir if unset.
    pub output_root: Option<PathBuf>,
    /// Demote hits whose artifact file no longer exists to re-renders.
    pub verify_artifacts: bool,
}

impl CacheSettings {
    /// Settings with the given store directory and defaults elsewhere.
    #[must_use]
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            output_root: None,
            verify_artifacts: true,
        }
    }
}

/// Orchestrates fingerprinting, the artifact store and the converter.
pub struct CacheController<C> {
    settings: CacheSettings,
    converter: C,
}

impl<C: Converter> CacheController<C> {
    /// Controller using `converter` for cache misses.
    pub fn new(settings: CacheSettings, converter: C) -> Self {
        Self {
            settings,
            converter,
        }
    }

    /// Resolve `request` to an artifact, rendering only when needed.
    ///
    /// # Errors
    ///
    /// Any failure aborts the request. Nothing is written to the store unless
    /// the converter reported success, and the output directory of a request
    /// that fails after allocating it is removed.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderOutcome, RenderError> {
        let fingerprint = fingerprint(&request.source)?;
        log::debug!("{} -> {}", request.source.display(), fingerprint);

        let store = ArtifactStore::open(&self.settings.store_dir)?;
        let result = self.resolve(&store, fingerprint, request);
        let closed = store.close();

        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    fn resolve(
        &self,
        store: &ArtifactStore,
        fingerprint: Fingerprint,
        request: &RenderRequest,
    ) -> Result<RenderOutcome, RenderError> {
        let status = match store.lookup(&fingerprint)? {
            Some(_) if request.force => CacheStatus::Forced,
            Some(path) => {
                if !self.settings.verify_artifacts || path.is_file() {
                    log::info!("Cache hit: {}", path.display());
                    return Ok(RenderOutcome {
                        artifact: path,
                        fingerprint,
                        status: CacheStatus::Hit,
                    });
                }
                log::warn!(
                    "Cached artifact {} no longer exists, re-rendering",
                    path.display()
                );
                CacheStatus::Stale
            }
            None if request.force => CacheStatus::Forced,
            None => CacheStatus::Miss,
        };
        log::info!("Cache {}: rendering {}", status, request.source.display());

        let output = self.allocate_output(&request.source)?;
        if output.to_str().is_none() {
            discard_output(&output);
            return Err(StoreError::NonUtf8Path(output).into());
        }
        let job = ConversionJob {
            source: &request.source,
            output: &output,
            stylesheet: request.stylesheet.as_deref(),
        };
        if let Err(e) = self.converter.convert(&job) {
            discard_output(&output);
            return Err(e.into());
        }

        log::info!("Updating cache");
        if let Err(e) = store.put(&fingerprint, &output) {
            discard_output(&output);
            return Err(e.into());
        }

        Ok(RenderOutcome {
            artifact: output,
            fingerprint,
            status,
        })
    }

    /// A fresh, never reused artifact path for `source`.
    fn allocate_output(&self, source: &Path) -> Result<PathBuf, RenderError> {
        let root = self
            .settings
            .output_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let output_dir_err = |source| RenderError::OutputDir {
            path: root.clone(),
            source,
        };

        fs::create_dir_all(&root).map_err(output_dir_err)?;
        let dir = tempfile::Builder::new()
            .prefix(OUTPUT_DIR_PREFIX)
            .tempdir_in(&root)
            .map_err(output_dir_err)?
            .keep();
        let dir = std::path::absolute(&dir).map_err(output_dir_err)?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string());
        Ok(dir.join(format!("{stem}.{ARTIFACT_EXTENSION}")))
    }
}

fn discard_output(output: &Path) {
    if let Some(dir) = output.parent() {
        if let Err(e) = fs::remove_dir_all(dir) {
            log::debug!("Failed to remove {}: {}", dir.display(), e);
        }
    }
}
