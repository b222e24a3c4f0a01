//! Cache entry definitions.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// A single fingerprint -> artifact mapping in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Hex fingerprint of the source content.
    #[serde(serialize_with = "serialize_fingerprint")]
    pub fingerprint: Fingerprint,
    /// Absolute path of the artifact rendered from that content.
    pub artifact_path: PathBuf,
    /// When the mapping was last written.
    pub rendered_at: DateTime<Utc>,
}

fn serialize_fingerprint<S>(fingerprint: &Fingerprint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&fingerprint.to_hex())
}
