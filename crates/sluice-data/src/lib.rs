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

//! Durable dedup store keyed by content digest.
//! Layout: error.rs (error types), store.rs (trait and records), sqlite.rs (embedded backend),
//! memory.rs (in-process backend).

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{DataError, DataResult, WorkError};
pub use memory::MemoryDedupStore;
pub use sqlite::SqliteDedupStore;
pub use store::{DedupStore, FileRecord, NewFileRecord, TransactionWork};
