//! The merge result: counters, id bookkeeping, and the failure verdict.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::MergeFailure;
use crate::feed::MergeType;

use super::strategy::MergeStrategy;

// ---------------------------------------------------------------------------
// ScopedKey
// ---------------------------------------------------------------------------

/// A source value qualified by the table it keys and the feed it came from.
///
/// Used for the skipped-id and remapped-id sets. Renders as
/// `table:scope:value`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopedKey {
    pub table: String,
    pub scope: String,
    pub value: String,
}

impl ScopedKey {
    #[must_use]
    pub fn new(table: &str, scope: &str, value: impl Into<String>) -> Self {
        Self {
            table: table.to_owned(),
            scope: scope.to_owned(),
            value: value.into(),
        }
    }

    /// Key for a service id. Services defined only in `calendar_dates` are
    /// filed under `calendar` too, so one lookup covers both tables.
    #[must_use]
    pub fn service(scope: &str, service_id: &str) -> Self {
        Self::new("calendar", scope, service_id)
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.scope, self.value)
    }
}

impl Serialize for ScopedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A key value that appeared more than once in the output namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdConflict {
    pub table: String,
    pub field: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// MergeResult
// ---------------------------------------------------------------------------

/// Everything a merge run reports back to its caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub merge_type: MergeType,
    pub feed_count: usize,
    /// Strategy chosen for a reconciling merge; `None` for namespace merges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MergeStrategy>,
    pub error_count: usize,
    /// Rows read but not written, for any reason.
    pub records_skipped: usize,
    /// Foreign-key values rewritten through `remapped_ids`.
    pub remapped_references: usize,
    /// Rows written per merged table; 0 when a table produced no rows.
    pub lines_per_table: BTreeMap<String, usize>,
    pub id_conflicts: BTreeSet<IdConflict>,
    /// Source keys whose rows were dropped; references to them are dropped too.
    pub skipped_ids: BTreeSet<ScopedKey>,
    /// Source keys whose value changed in the output.
    pub remapped_ids: BTreeMap<ScopedKey, String>,
    /// Service ids present in the output.
    pub service_ids: BTreeSet<String>,
    /// Archive entries no table describes, as `feed id/entry`. They are not
    /// carried into the output.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub ignored_entries: BTreeSet<String>,
    pub failed: bool,
    pub failure_reasons: BTreeSet<String>,
}

impl MergeResult {
    #[must_use]
    pub const fn new(merge_type: MergeType, feed_count: usize) -> Self {
        Self {
            merge_type,
            feed_count,
            strategy: None,
            error_count: 0,
            records_skipped: 0,
            remapped_references: 0,
            lines_per_table: BTreeMap::new(),
            id_conflicts: BTreeSet::new(),
            skipped_ids: BTreeSet::new(),
            remapped_ids: BTreeMap::new(),
            service_ids: BTreeSet::new(),
            ignored_entries: BTreeSet::new(),
            failed: false,
            failure_reasons: BTreeSet::new(),
        }
    }

    /// Record a failure. The output will not be published.
    pub fn fail(&mut self, failure: &MergeFailure) {
        self.failed = true;
        self.error_count += 1;
        self.failure_reasons.insert(failure.to_string());
    }

    /// Count a dropped row, remembering its key when later rows may refer to it.
    pub fn skip(&mut self, key: Option<ScopedKey>) {
        self.records_skipped += 1;
        if let Some(key) = key {
            self.skipped_ids.insert(key);
        }
    }

    #[must_use]
    pub fn is_skipped(&self, key: &ScopedKey) -> bool {
        self.skipped_ids.contains(key)
    }

    /// Record that `key` is written as `value`. The first mapping wins.
    pub fn remap(&mut self, key: ScopedKey, value: String) {
        self.remapped_ids.entry(key).or_insert(value);
    }

    /// Rewrite a reference through `remapped_ids`, counting the rewrite.
    pub fn resolve_remap(&mut self, key: &ScopedKey) -> Option<String> {
        let value = self.remapped_ids.get(key).cloned()?;
        self.remapped_references += 1;
        Some(value)
    }

    pub fn conflict(&mut self, table: &str, field: &str, value: &str) {
        self.id_conflicts.insert(IdConflict {
            table: table.to_owned(),
            field: field.to_owned(),
            value: value.to_owned(),
        });
    }

    /// Pretty-printed JSON report.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_sets_flag_and_counts() {
        let mut result = MergeResult::new(MergeType::Reconciling, 2);
        let failure = MergeFailure::MatchingTripsDifferentServices { trip_count: 3 };
        result.fail(&failure);
        result.fail(&failure);
        assert!(result.failed);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.failure_reasons.len(), 1);
    }

    #[test]
    fn first_remap_wins_and_lookups_are_counted() {
        let mut result = MergeResult::new(MergeType::Reconciling, 2);
        let key = ScopedKey::new("stops", "Bart1", "S1");
        result.remap(key.clone(), "S9".into());
        result.remap(key.clone(), "S8".into());
        assert_eq!(result.resolve_remap(&key).as_deref(), Some("S9"));
        assert_eq!(result.resolve_remap(&ScopedKey::new("stops", "Bart1", "S2")), None);
        assert_eq!(result.remapped_references, 1);
    }

    #[test]
    fn report_renders_scoped_keys_as_strings() {
        let mut result = MergeResult::new(MergeType::Namespace, 1);
        result.skip(Some(ScopedKey::service("Bart1", "WK")));
        result.remap(ScopedKey::new("trips", "Bart1", "T1"), "Bart1:T1".into());
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["merge_type"], "namespace");
        assert_eq!(json["skipped_ids"][0], "calendar:Bart1:WK");
        assert_eq!(json["remapped_ids"]["trips:Bart1:T1"], "Bart1:T1");
        assert!(json.get("strategy").is_none());
    }
}
