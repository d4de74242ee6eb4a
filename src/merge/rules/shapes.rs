//! `shapes` rows in a reconciling merge.

use std::collections::BTreeSet;

use crate::config::MergeConfig;
use crate::merge::context::FeedRole;
use crate::merge::frame::{RowFrame, RowPlan};
use crate::merge::result::{MergeResult, ScopedKey};

/// Remembers the newer feed's shape ids. An older-feed shape with one of
/// those ids is scoped, and the older feed's trips follow it through the
/// remap.
#[derive(Debug, Default)]
pub struct ShapesRule {
    future_shapes: BTreeSet<String>,
}

impl ShapesRule {
    pub fn plan_row(
        &mut self,
        frame: &RowFrame<'_>,
        config: &MergeConfig,
        result: &mut MergeResult,
    ) -> RowPlan {
        let shape_id = frame.key();
        let mut plan = RowPlan::keep();
        match frame.role {
            FeedRole::Active if self.future_shapes.contains(shape_id) => {
                let scoped = config.scoped(frame.scope, shape_id);
                result.remap(ScopedKey::new("shapes", frame.scope, shape_id), scoped.clone());
                plan.set("shape_id", scoped);
            }
            FeedRole::Active => {}
            FeedRole::Future | FeedRole::Peer => {
                if !self.future_shapes.contains(shape_id) {
                    self.future_shapes.insert(shape_id.to_owned());
                }
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use csv::StringRecord;
    use gtfs_schema::Schema;

    use super::*;
    use crate::archive::TableData;
    use crate::feed::MergeType;

    #[test]
    fn older_shape_sharing_a_newer_id_is_scoped() {
        let schema = Schema::default();
        let table = schema.table("shapes").unwrap();
        let data = TableData::new(
            vec!["shape_id".into(), "shape_pt_sequence".into()],
            vec![
                StringRecord::from(vec!["SH1", "1"]),
                StringRecord::from(vec!["SH2", "1"]),
                StringRecord::from(vec!["SH2", "2"]),
            ],
        );
        let frame = |role, idx: usize| {
            RowFrame::new(table, 0, role, "Bart1", idx + 2, &data, &data.records()[idx], None)
        };
        let config = MergeConfig::default();
        let mut rule = ShapesRule::default();
        let mut result = MergeResult::new(MergeType::Reconciling, 2);

        assert_eq!(rule.plan_row(&frame(FeedRole::Future, 0), &config, &mut result), RowPlan::keep());

        let plan = rule.plan_row(&frame(FeedRole::Active, 0), &config, &mut result);
        assert_eq!(plan.overrides["shape_id"], "Bart1:SH1");

        // Points of an older-only shape keep their id.
        for idx in [1, 2] {
            let plan = rule.plan_row(&frame(FeedRole::Active, idx), &config, &mut result);
            assert!(plan.overrides.is_empty());
        }
        assert_eq!(result.remapped_ids.len(), 1);
    }
}
