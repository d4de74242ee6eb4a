//! Feed versions, merge types, and the id scope used to disambiguate values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// MergeType
// ---------------------------------------------------------------------------

/// How the input feeds relate to each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeType {
    /// Unrelated feeds combined side by side. Every id is prefixed with its
    /// feed's scope so nothing collides.
    #[default]
    #[serde(alias = "regional")]
    Namespace,
    /// Two versions of the same feed reconciled into one timeline.
    #[serde(alias = "service-period")]
    Reconciling,
}

impl fmt::Display for MergeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace => write!(f, "namespace"),
            Self::Reconciling => write!(f, "reconciling"),
        }
    }
}

impl FromStr for MergeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "namespace" | "regional" => Ok(Self::Namespace),
            "reconciling" | "service-period" => Ok(Self::Reconciling),
            other => Err(format!(
                "unknown merge type '{other}' (expected 'namespace' or 'reconciling')"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// FeedVersion
// ---------------------------------------------------------------------------

/// One input feed: where it lives and which dates it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedVersion {
    /// Unique identifier, used in logs and failure messages.
    pub id: String,
    /// Name of the publishing source. Feeds from the same source share it.
    pub source_name: String,
    /// Ordinal of this version within its source.
    pub version: u32,
    /// Path to the zip archive.
    pub archive_path: PathBuf,
    /// First date with service.
    pub first_date: Option<NaiveDate>,
    /// Last date with service.
    pub last_date: Option<NaiveDate>,
}

impl FeedVersion {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source_name: impl Into<String>,
        version: u32,
        archive_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            source_name: source_name.into(),
            version,
            archive_path: archive_path.into(),
            first_date: None,
            last_date: None,
        }
    }

    /// Set the service date range.
    #[must_use]
    pub const fn with_service_range(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.first_date = Some(first);
        self.last_date = Some(last);
        self
    }

    /// The prefix this feed's values get when they must be disambiguated:
    /// the cleaned source name followed by the version ordinal.
    #[must_use]
    pub fn id_scope(&self) -> String {
        format!("{}{}", clean_name(&self.source_name), self.version)
    }
}

/// Make a name safe for use in an identifier prefix.
///
/// Spaces become underscores; anything outside `[A-Za-z0-9_-]` is dropped.
#[must_use]
pub fn clean_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a GTFS `YYYYMMDD` date.
///
/// # Errors
/// Returns [`MergeError::InvalidDate`] naming the table and field.
pub fn parse_date(table: &str, field: &str, value: &str) -> Result<NaiveDate, MergeError> {
    let value = value.trim();
    if value.len() != 8 {
        return Err(invalid_date(table, field, value));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid_date(table, field, value))
}

/// Format a date as GTFS `YYYYMMDD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn invalid_date(table: &str, field: &str, value: &str) -> MergeError {
    MergeError::InvalidDate {
        table: table.to_owned(),
        field: field.to_owned(),
        value: value.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_replaces_spaces_and_drops_punctuation() {
        assert_eq!(clean_name("Bay Area Rapid Transit"), "Bay_Area_Rapid_Transit");
        assert_eq!(clean_name("AC/Transit (East)"), "ACTransit_East");
        assert_eq!(clean_name("muni-sf_2"), "muni-sf_2");
    }

    #[test]
    fn id_scope_joins_clean_name_and_version() {
        let feed = FeedVersion::new("v", "Big Bus", 7, "/tmp/a.zip");
        assert_eq!(feed.id_scope(), "Big_Bus7");
    }

    #[test]
    fn merge_type_accepts_legacy_names() {
        assert_eq!("regional".parse::<MergeType>().unwrap(), MergeType::Namespace);
        assert_eq!(
            "service-period".parse::<MergeType>().unwrap(),
            MergeType::Reconciling
        );
        assert!("other".parse::<MergeType>().is_err());
    }

    #[test]
    fn merge_type_display_round_trips_through_from_str() {
        for ty in [MergeType::Namespace, MergeType::Reconciling] {
            assert_eq!(ty.to_string().parse::<MergeType>().unwrap(), ty);
        }
    }

    #[test]
    fn parse_date_accepts_gtfs_format() {
        let date = parse_date("calendar", "start_date", "20240301").unwrap();
        assert_eq!(format_date(date), "20240301");
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("calendar", "start_date", "2024-03-01").is_err());
        assert!(parse_date("calendar", "start_date", "20241301").is_err());
        assert!(parse_date("calendar", "start_date", "").is_err());
    }
}
