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

//! Sluice application wiring.
//!
//! Layout: `bootstrap.rs` (startup, tick loop, shutdown), `processor.rs` (per-tick
//! ingest pipeline), `cli.rs` (flags and environment).

/// Application bootstrap and the tick loop.
pub mod bootstrap;
/// Command-line flags mapped onto the typed configuration.
pub mod cli;
/// Application error types.
pub mod error;
/// Ready-path processing.
pub mod processor;

pub use bootstrap::{run_app, run_until};
pub use cli::Cli;
pub use error::{AppError, AppResult};
pub use processor::{Processor, ProcessorSettings, TickSummary};
