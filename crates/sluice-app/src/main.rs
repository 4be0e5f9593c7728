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

//! Binary entrypoint: parse flags, then watch and ingest until a shutdown signal.

use clap::Parser;
use sluice_app::{AppResult, Cli, run_app};

/// Boots the ingestor and blocks until shutdown.
#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let config = cli.ingest_config()?;
    let logging = cli.logging_config()?;
    run_app(config, &logging).await
}
