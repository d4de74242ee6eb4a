//! `stops` and `routes` in a reconciling merge: matching rows on an
//! alternate key.
//!
//! Stop ids and route ids are often regenerated between versions of a feed
//! while `stop_code` and `route_short_name` stay put. When every feed fills
//! the alternate key it is treated as authoritative: a row whose alternate
//! value was already written is dropped and its id remapped onto the first
//! row's id. The primary key stays a safety net, so two rows with distinct
//! alternate values but the same id are kept apart by scoping the second.

use std::collections::HashMap;

use gtfs_schema::TableDescriptor;

use crate::archive::TableData;
use crate::config::MergeConfig;
use crate::error::MergeFailure;
use crate::merge::frame::{RowFrame, RowPlan, SkipReason};
use crate::merge::result::{MergeResult, ScopedKey};
use crate::registry::ReferenceRegistry;

#[derive(Debug, Default)]
pub struct KeyedRule {
    alt_field: Option<&'static str>,
    /// Alternate value to the id written for the first row carrying it.
    written: HashMap<String, String>,
}

impl KeyedRule {
    /// Decide whether rows of `table` are matched on its alternate key.
    ///
    /// # Errors
    /// Returns [`MergeFailure::StopCodeCoverage`] when some regular stops
    /// carry a `stop_code` and others do not.
    pub fn select(table: &TableDescriptor, inputs: &[&TableData]) -> Result<Self, MergeFailure> {
        let Some(alt) = table.alt_key_field else {
            return Ok(Self::default());
        };
        let use_alt = if table.name == "stops" {
            stop_codes_complete(inputs)?
        } else {
            inputs
                .iter()
                .all(|data| data.records().iter().all(|r| !data.value(r, alt).is_empty()))
        };
        if !use_alt {
            tracing::debug!(table = table.name, field = alt, "alternate key incomplete; matching on ids");
        }
        Ok(Self {
            alt_field: use_alt.then_some(alt),
            written: HashMap::new(),
        })
    }

    /// The field rows are identified by.
    #[must_use]
    pub fn key_field(&self, table: &TableDescriptor) -> Option<&'static str> {
        self.alt_field.or(table.key_field)
    }

    pub fn plan_row(
        &mut self,
        frame: &RowFrame<'_>,
        config: &MergeConfig,
        registry: &ReferenceRegistry,
        result: &mut MergeResult,
    ) -> RowPlan {
        let Some(alt) = self.alt_field else {
            return RowPlan::keep();
        };
        let table = frame.table.name;
        let Some(key_field) = frame.table.key_field else {
            return RowPlan::keep();
        };
        let id = frame.key();
        let alt_value = frame.raw(alt);

        if alt_value.is_empty() {
            // Only special stops get here; they are matched on id alone.
            if registry.contains(table, key_field, id) {
                result.conflict(table, key_field, id);
                return RowPlan::skip(SkipReason::Duplicate, None);
            }
            return RowPlan::keep();
        }

        if let Some(first) = self.written.get(alt_value) {
            if first != id {
                result.remap(ScopedKey::new(table, frame.scope, id), first.clone());
            }
            tracing::debug!(table, id, alt = alt_value, matched = %first, "matched on alternate key");
            return RowPlan::skip(SkipReason::Duplicate, None);
        }

        let mut plan = RowPlan::keep();
        let written = if registry.contains(table, key_field, id) {
            result.conflict(table, key_field, id);
            let scoped = config.scoped(frame.scope, id);
            result.remap(ScopedKey::new(table, frame.scope, id), scoped.clone());
            plan.set(key_field, scoped.clone());
            scoped
        } else {
            id.to_owned()
        };
        self.written.insert(alt_value.to_owned(), written);
        plan
    }
}

/// Whether every regular stop has a `stop_code`. Special stops (stations,
/// entrances, nodes) are exempt.
///
/// Returns `Ok(false)` when no regular stop has one.
fn stop_codes_complete(inputs: &[&TableData]) -> Result<bool, MergeFailure> {
    let mut total = 0;
    let mut missing = 0;
    let mut special = 0;
    for data in inputs {
        for record in data.records() {
            let location_type = data.value(record, "location_type");
            if !location_type.is_empty() && location_type != "0" {
                special += 1;
                continue;
            }
            total += 1;
            if data.value(record, "stop_code").is_empty() {
                missing += 1;
            }
        }
    }
    match missing {
        0 => Ok(total > 0),
        m if m == total => Ok(false),
        _ => Err(MergeFailure::StopCodeCoverage {
            missing,
            total,
            special,
        }),
    }
}

#[cfg(test)]
mod tests {
    use csv::StringRecord;
    use gtfs_schema::Schema;

    use super::*;
    use crate::feed::MergeType;
    use crate::merge::context::FeedRole;
    use crate::registry::FieldCheck;

    fn stops(rows: &[[&str; 3]]) -> TableData {
        TableData::new(
            vec!["stop_id".into(), "stop_code".into(), "location_type".into()],
            rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        )
    }

    // -- Coverage --

    #[test]
    fn full_coverage_uses_stop_code() {
        let schema = Schema::default();
        let table = schema.table("stops").unwrap();
        let a = stops(&[["S1", "100", ""], ["ST", "", "1"]]);
        let b = stops(&[["S9", "100", "0"]]);
        let rule = KeyedRule::select(table, &[&a, &b]).unwrap();
        assert_eq!(rule.key_field(table), Some("stop_code"));
    }

    #[test]
    fn no_coverage_uses_stop_id() {
        let schema = Schema::default();
        let table = schema.table("stops").unwrap();
        let a = stops(&[["S1", "", ""]]);
        let rule = KeyedRule::select(table, &[&a]).unwrap();
        assert_eq!(rule.key_field(table), Some("stop_id"));
    }

    #[test]
    fn partial_coverage_fails_with_counts() {
        let schema = Schema::default();
        let table = schema.table("stops").unwrap();
        let a = stops(&[["S1", "100", ""], ["S2", "101", ""], ["ST", "", "1"]]);
        let b = stops(&[["S3", "", ""]]);
        let err = KeyedRule::select(table, &[&a, &b]).unwrap_err();
        assert_eq!(
            err,
            MergeFailure::StopCodeCoverage {
                missing: 1,
                total: 3,
                special: 1
            }
        );
    }

    #[test]
    fn routes_use_short_name_only_when_always_present() {
        let schema = Schema::default();
        let table = schema.table("routes").unwrap();
        let full = TableData::new(
            vec!["route_id".into(), "route_short_name".into()],
            vec![StringRecord::from(vec!["R1", "10"])],
        );
        let gap = TableData::new(
            vec!["route_id".into(), "route_short_name".into()],
            vec![StringRecord::from(vec!["R2", ""])],
        );
        let rule = KeyedRule::select(table, &[&full]).unwrap();
        assert_eq!(rule.key_field(table), Some("route_short_name"));
        let rule = KeyedRule::select(table, &[&full, &gap]).unwrap();
        assert_eq!(rule.key_field(table), Some("route_id"));
    }

    // -- Row matching --

    #[test]
    fn alternate_key_wins_over_id() {
        let schema = Schema::default();
        let table = schema.table("stops").unwrap();
        let future = stops(&[["S1", "100", ""], ["S2", "200", ""]]);
        let active = stops(&[["X1", "100", ""], ["S2", "300", ""]]);
        let mut rule = KeyedRule::select(table, &[&future, &active]).unwrap();
        let config = MergeConfig::default();
        let mut registry = ReferenceRegistry::new();
        let mut result = MergeResult::new(MergeType::Reconciling, 2);

        for (idx, record) in future.records().iter().enumerate() {
            let frame = RowFrame::new(table, 0, FeedRole::Future, "Bart2", idx + 2, &future, record, None);
            assert_eq!(rule.plan_row(&frame, &config, &registry, &mut result), RowPlan::keep());
            for field in ["stop_id", "stop_code"] {
                registry.check(&FieldCheck {
                    table,
                    field: table.field(field).unwrap(),
                    value: future.value(record, field),
                    key_value: frame.key(),
                    key_field: "stop_code",
                    order_field: None,
                    line: frame.line,
                });
            }
        }

        let frame = |idx: usize| {
            RowFrame::new(table, 1, FeedRole::Active, "Bart1", idx + 2, &active, &active.records()[idx], None)
        };

        // Same code, different id: dropped, id remapped to the newer stop.
        let plan = rule.plan_row(&frame(0), &config, &registry, &mut result);
        assert_eq!(plan.skip.unwrap().reason, SkipReason::Duplicate);
        assert_eq!(result.remapped_ids[&ScopedKey::new("stops", "Bart1", "X1")], "S1");

        // Same id, different code: kept under a scoped id.
        let plan = rule.plan_row(&frame(1), &config, &registry, &mut result);
        assert_eq!(plan.overrides["stop_id"], "Bart1:S2");
        assert!(result.id_conflicts.iter().any(|c| c.value == "S2"));
    }
}
