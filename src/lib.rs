//! mdv - Markdown preview with a content-addressed render cache
//!
//! Converts a document to HTML with an external converter (pandoc), keyed by
//! a BLAKE3 fingerprint of its content, so an unchanged document is opened
//! straight from the cache instead of being converted again.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod render;
pub mod viewer;

pub use app::run_app;
