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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (temp directories and files), wait.rs (polling helpers).

pub mod fixtures;
pub mod wait;
