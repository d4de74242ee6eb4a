//! `translations` rows: `record_id` follows the row it names.
//!
//! The column is a reference whose target table is given per row by
//! `table_name`, so it cannot be declared in the schema. Instead the rule
//! rewrites it the same way the named row was rewritten: through a recorded
//! remap, or by scoping in a namespace merge.

use crate::feed::MergeType;
use crate::merge::context::MergeContext;
use crate::merge::frame::{RowFrame, RowPlan};
use crate::merge::result::{MergeResult, ScopedKey};

pub fn plan_row(frame: &RowFrame<'_>, ctx: &MergeContext<'_>, result: &mut MergeResult) -> RowPlan {
    let mut plan = RowPlan::keep();
    let record_id = frame.raw("record_id");
    if record_id.is_empty() {
        return plan;
    }
    let key = ScopedKey::new(keyed_by(frame.raw("table_name")), frame.scope, record_id);
    if let Some(remapped) = result.resolve_remap(&key) {
        plan.set("record_id", remapped);
    } else if ctx.merge_type == MergeType::Namespace {
        plan.set("record_id", ctx.config.scoped(frame.scope, record_id));
    }
    plan
}

/// The table whose keys `record_id` values of `table_name` are recorded under.
fn keyed_by(table_name: &str) -> &str {
    match table_name {
        "stop_times" | "frequencies" => "trips",
        "calendar_dates" => "calendar",
        other => other,
    }
}
