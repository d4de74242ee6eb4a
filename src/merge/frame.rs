//! Per-row merge frames and the plans table rules produce for them.
//!
//! A [`RowFrame`] is an immutable view of one input row together with where
//! it came from. Table rules look at a frame and return a [`RowPlan`]:
//! whether to keep the row, which fields to write differently, and which
//! extra rows to emit after it. Resolving references, checking keys, and
//! writing are left to the line merger.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use csv::StringRecord;
use gtfs_schema::TableDescriptor;

use crate::archive::TableData;
use crate::error::MergeError;
use crate::feed::parse_date;

use super::context::FeedRole;
use super::result::ScopedKey;

// ---------------------------------------------------------------------------
// RowFrame
// ---------------------------------------------------------------------------

/// One input row and its provenance.
#[derive(Clone, Copy, Debug)]
pub struct RowFrame<'a> {
    pub table: &'a TableDescriptor,
    pub feed_index: usize,
    pub role: FeedRole,
    /// Id scope of the feed the row came from.
    pub scope: &'a str,
    /// 1-based line number; the header is line 1.
    pub line: usize,
    data: &'a TableData,
    record: &'a StringRecord,
    agency_id: Option<&'a str>,
}

impl<'a> RowFrame<'a> {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        table: &'a TableDescriptor,
        feed_index: usize,
        role: FeedRole,
        scope: &'a str,
        line: usize,
        data: &'a TableData,
        record: &'a StringRecord,
        agency_id: Option<&'a str>,
    ) -> Self {
        Self {
            table,
            feed_index,
            role,
            scope,
            line,
            data,
            record,
            agency_id,
        }
    }

    /// The input value of `field`, with a blank `agency_id` filled in from
    /// the feed's synthesized agency.
    #[must_use]
    pub fn raw(&self, field: &str) -> &'a str {
        let value = self.data.value(self.record, field);
        match self.agency_id {
            Some(agency_id) if value.is_empty() && field == "agency_id" => agency_id,
            _ => value,
        }
    }

    /// The input value of `field` exactly as the archive holds it.
    #[must_use]
    pub fn source(&self, field: &str) -> &'a str {
        self.data.value(self.record, field)
    }

    /// The row's primary key value, or `""` for keyless tables.
    #[must_use]
    pub fn key(&self) -> &'a str {
        self.table.key_field.map_or("", |k| self.raw(k))
    }

    /// Parse a `YYYYMMDD` field.
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidDate`] if the value is not a date.
    pub fn date(&self, field: &str) -> Result<NaiveDate, MergeError> {
        parse_date(self.table.name, field, self.raw(field))
    }

    /// Key under which this row is recorded when it is dropped.
    #[must_use]
    pub fn scoped_key(&self) -> ScopedKey {
        let value = match self.table.order_field {
            Some(order) => format!("{}:{}", self.key(), self.raw(order)),
            None => self.key().to_owned(),
        };
        ScopedKey::new(self.table.name, self.scope, value)
    }
}

// ---------------------------------------------------------------------------
// RowPlan
// ---------------------------------------------------------------------------

/// Why a row is not written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Same key, or same content, as a row already written.
    Duplicate,
    /// Replaced by the newer feed's version of the same data.
    Superseded,
    /// Falls entirely on or after the newer feed's first date.
    Expired,
    /// Only used by trips that are not written.
    Unused,
    /// References a row that was not written.
    Dangling,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
            Self::Superseded => write!(f, "superseded by newer feed"),
            Self::Expired => write!(f, "starts after newer feed begins"),
            Self::Unused => write!(f, "unused"),
            Self::Dangling => write!(f, "dangling reference"),
        }
    }
}

/// A dropped row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skip {
    pub reason: SkipReason,
    /// Recorded in the skipped-id set so references to the row drop too.
    pub record: Option<ScopedKey>,
}

/// Field values to write in place of the row's own.
pub type Overrides = BTreeMap<&'static str, String>;

/// What to do with one row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowPlan {
    pub skip: Option<Skip>,
    pub overrides: Overrides,
    /// Copies of the row, each with its own overrides, written after it
    /// (or in its place when it is skipped).
    pub extras: Vec<Overrides>,
}

impl RowPlan {
    #[must_use]
    pub fn keep() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn skip(reason: SkipReason, record: Option<ScopedKey>) -> Self {
        Self {
            skip: Some(Skip { reason, record }),
            ..Self::default()
        }
    }

    /// Write `value` for `field`.
    pub fn set(&mut self, field: &'static str, value: String) {
        self.overrides.insert(field, value);
    }

    /// Also write a copy of the row with `field` set to `value`.
    pub fn copy_with(&mut self, field: &'static str, value: String) {
        self.extras.push(Overrides::from([(field, value)]));
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }
}

#[cfg(test)]
mod tests {
    use gtfs_schema::Schema;

    use super::*;

    fn routes_data() -> TableData {
        TableData::new(
            vec!["route_id".into(), "agency_id".into(), "route_type".into()],
            vec![
                StringRecord::from(vec!["R1", "", "3"]),
                StringRecord::from(vec!["R2", "MUNI", "3"]),
            ],
        )
    }

    #[test]
    fn blank_agency_is_filled_from_synthesized_id() {
        let schema = Schema::default();
        let routes = schema.table("routes").unwrap();
        let data = routes_data();
        let blank = RowFrame::new(
            routes,
            0,
            FeedRole::Peer,
            "Muni1",
            2,
            &data,
            &data.records()[0],
            Some("agency-abc"),
        );
        assert_eq!(blank.raw("agency_id"), "agency-abc");
        assert_eq!(blank.source("agency_id"), "");

        let set = RowFrame::new(
            routes,
            0,
            FeedRole::Peer,
            "Muni1",
            3,
            &data,
            &data.records()[1],
            Some("agency-abc"),
        );
        assert_eq!(set.raw("agency_id"), "MUNI");
        assert_eq!(set.key(), "R2");
    }

    #[test]
    fn scoped_key_includes_order_value() {
        let schema = Schema::default();
        let stop_times = schema.table("stop_times").unwrap();
        let data = TableData::new(
            vec!["trip_id".into(), "stop_id".into(), "stop_sequence".into()],
            vec![StringRecord::from(vec!["T1", "S1", "4"])],
        );
        let frame = RowFrame::new(
            stop_times,
            1,
            FeedRole::Active,
            "Bart1",
            2,
            &data,
            &data.records()[0],
            None,
        );
        assert_eq!(frame.scoped_key().to_string(), "stop_times:Bart1:T1:4");
    }

    #[test]
    fn plan_builders() {
        let mut plan = RowPlan::keep();
        assert!(!plan.is_skipped());
        plan.set("end_date", "20240229".into());
        plan.copy_with("service_id", "Bart2:WK".into());
        assert_eq!(plan.overrides["end_date"], "20240229");
        assert_eq!(plan.extras[0]["service_id"], "Bart2:WK");

        let skipped = RowPlan::skip(SkipReason::Unused, None);
        assert_eq!(skipped.skip.unwrap().reason, SkipReason::Unused);
    }
}
