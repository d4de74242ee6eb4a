//! feedmerge library crate.
//!
//! The primary interface is the `feedmerge` binary. The library exposes the
//! merge engine so integration tests (and other tools) can merge feeds
//! without going through the CLI.

pub mod archive;
pub mod config;
pub mod error;
pub mod feed;
pub mod merge;
pub mod registry;
pub mod telemetry;

pub use error::{MergeError, MergeFailure};
pub use feed::{FeedVersion, MergeType};
pub use merge::{MergeResult, merge_feeds};
