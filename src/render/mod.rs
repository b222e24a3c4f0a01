//! Rendering through the content-addressed cache.
//!
//! - [`invoker`]: the converter boundary (argument contract, process
//!   execution, output checks)
//! - [`controller`]: the cache decision for one request
//!
//! # Example
//!
//! ```no_run
//! use mdv::render::{CacheController, CacheSettings, PandocConverter, RenderRequest};
//!
//! let controller = CacheController::new(
//!     CacheSettings::new("/home/me/.config/mdv/store"),
//!     PandocConverter::default(),
//! );
//! let outcome = controller.render(&RenderRequest::new("README.md"))?;
//! println!("{} ({})", outcome.artifact.display(), outcome.status);
//! # Ok::<(), mdv::render::RenderError>(())
//! ```

pub mod controller;
pub mod invoker;

pub use controller::{
    CacheController, CacheSettings, CacheStatus, RenderError, RenderOutcome, RenderRequest,
};
pub use invoker::{
    build_args, ConversionJob, ConvertError, Converter, PandocConverter, DEFAULT_CONVERTER,
};
