//! Error types for feed merging.
//!
//! Two layers:
//!
//! - [`MergeError`] is returned through `Result` when the merge cannot run at
//!   all: unreadable files, malformed CSV, bad caller input.
//! - [`MergeFailure`] is a merge that ran but was judged unsafe to publish.
//!   Failures are recorded on the [`MergeResult`](crate::merge::MergeResult)
//!   rather than returned as errors, so callers always get the counters and
//!   reasons gathered up to that point.

use std::path::PathBuf;

use gtfs_schema::SchemaError;
use thiserror::Error;

/// Errors that stop a merge before it can produce a result.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        source: std::io::Error,
    },

    /// A zip archive could not be read or written.
    #[error("archive error in {}: {source}", path.display())]
    Zip {
        /// Archive being accessed.
        path: PathBuf,
        source: zip::result::ZipError,
    },

    /// A table in an archive is not valid CSV.
    #[error("malformed {table}.txt in {}: {source}", path.display())]
    Csv {
        /// Archive the table was read from.
        path: PathBuf,
        /// Table name without suffix.
        table: String,
        source: csv::Error,
    },

    /// A date column did not hold an eight-digit `YYYYMMDD` date.
    #[error("invalid date '{value}' in {table}.{field}\n  To fix: dates must be formatted YYYYMMDD")]
    InvalidDate {
        table: String,
        field: String,
        /// The raw value that failed to parse.
        value: String,
    },

    /// The caller asked for something the merge cannot do.
    #[error("invalid merge input: {message}")]
    InvalidInput {
        /// What was wrong and how to fix it.
        message: String,
    },

    /// The configuration file could not be loaded or is inconsistent.
    #[error("config error: {message}")]
    Config {
        /// Details, including the offending path or key.
        message: String,
    },

    /// The finished archive could not be moved into place.
    #[error("failed to persist merged archive to {}: {source}", path.display())]
    Persist {
        /// Destination path.
        path: PathBuf,
        source: std::io::Error,
    },

    /// A table name was not found in the schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl MergeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// A condition that makes the merged output unsafe to publish.
///
/// Recorded on the result via its `Display` text; the output archive is not
/// persisted once any failure has been recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeFailure {
    /// A trip id present in both feeds runs on different services.
    #[error(
        "trip {trip_id} runs on service {future_service} in the newer feed but on \
         {active_service} in the older feed; trip ids must keep their service across versions"
    )]
    TripServiceConflict {
        trip_id: String,
        future_service: String,
        active_service: String,
    },

    /// Both feeds define the same trips but disagree on the set of services.
    #[error(
        "both feeds define the same {trip_count} trips but different service ids; \
         trips cannot be matched to a service"
    )]
    MatchingTripsDifferentServices { trip_count: usize },

    /// Some feeds identify stops by `stop_code` and others do not.
    #[error(
        "inconsistent stop_code coverage: if stop_code is provided for some regular stops \
         (location_type empty or 0), all must have it; {missing} of {total} stops are \
         missing stop_code ({special} special stops exempt)"
    )]
    StopCodeCoverage {
        missing: usize,
        total: usize,
        special: usize,
    },

    /// The older feed names an agency the newer feed does not define.
    #[error(
        "agency_id '{active_agency}' in the older feed does not match any agency in the newer \
         feed (for example '{future_agency}'); agency ids must match across versions"
    )]
    AgencyMismatch {
        active_agency: String,
        future_agency: String,
    },

    /// More than one agency row lacks an `agency_id`, so none can be synthesized.
    #[error(
        "feed {feed} has multiple agency records but no agency_id values ({count} blank); \
         ids are required when a feed has several agencies"
    )]
    MultipleAgenciesWithoutId { feed: String, count: usize },

    /// An input archive could not be opened.
    #[error("feed {feed} could not be read: {reason}")]
    UnreadableArchive { feed: String, reason: String },
}
