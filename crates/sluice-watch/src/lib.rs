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

//! Decides when a file dropped into the input directory is fully written.
//!
//! Notifications are translated into [`FsEvent`]s and folded into a concurrent
//! tracking map by the [`CompletionDetector`]; the active [`CompletionRule`]
//! decides which tracked paths are ready. The [`Reconciler`] re-arms files that
//! exist on disk but were never observed through notifications.

pub mod detector;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod rules;
pub mod tracking;

pub use detector::CompletionDetector;
pub use error::{WatchError, WatchResult};
pub use event::{FsEvent, FsEventKind, translate};
pub use reconcile::{ReconcileSummary, Reconciler};
pub use rules::{CompletionRule, Rule, SidecarRule, StabilityRule};
pub use tracking::{FileSnapshot, PathState, SettledPaths, TrackedPath};
