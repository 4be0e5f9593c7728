#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(dead_code, unused, unreachable_pub, missing_docs)]

//! Typed configuration for the Sluice ingestor.
//!
//! Layout: `model.rs` (configuration document and policy variants), `defaults.rs`
//! (defaults inherited by every entrypoint), `validate.rs` (validation helpers).

pub mod defaults;
pub mod error;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{CompletionPolicy, DestinationLayout, IngestConfig};
