//! Persistent artifact store for the render cache.
//!
//! This module maps content fingerprints to the HTML artifacts previously
//! rendered from that content, so an unchanged document is never converted
//! twice.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema versioning, and the exclusive
//!   directory lock that makes a store handle single-owner.
//! * [`entry`]: The data model of a stored mapping.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by fingerprint only. A mapping is replaced when a forced
//! re-render writes a new artifact for the same fingerprint; nothing else
//! (mtime, permissions, file name) invalidates it. Old mappings for content
//! that has since changed are left in place.

pub mod database;
pub mod entry;

pub use database::{ArtifactStore, StoreError, StoreResult};
pub use entry::CacheEntry;
