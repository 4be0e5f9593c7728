//! Filesystem primitives for the ingest pipeline: candidate filtering, content
//! hashing, atomic relocation, destination layout and the provenance manifest.
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
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod filter;
pub mod hasher;
pub mod layout;
pub mod manifest;
pub mod mover;

pub use error::{FsOpsError, FsOpsResult};
pub use filter::{SIDECAR_SUFFIX, TEMP_SUFFIXES, is_candidate, is_sidecar_marker, sidecar_target};
pub use hasher::{Digest, digest_file, digest_reader};
pub use layout::{destination_for, disambiguate};
pub use manifest::{MANIFEST_FILE_NAME, ManifestEntry, ManifestWriter};
pub use mover::{AtomicMover, FileOps, MoveStrategy, StdFileOps, move_file};
