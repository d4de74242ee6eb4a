//! `trips` rows in a reconciling merge.

use crate::config::MergeConfig;
use crate::merge::context::{FeedRole, Reconcile};
use crate::merge::frame::{RowFrame, RowPlan, SkipReason};
use crate::merge::result::{MergeResult, ScopedKey};

/// Newer-only trips on an extended service move to the service's clone.
/// Older trips identical to a newer one are dropped; older trips sharing an
/// id with a different trip are scoped.
pub fn plan_row(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
    result: &mut MergeResult,
) -> RowPlan {
    let trip_id = frame.key();
    let mut plan = RowPlan::keep();

    if frame.role != FeedRole::Active {
        let service_id = frame.raw("service_id");
        if !rc.active.trip_ids.contains(trip_id)
            && rc.plan.clone_future_services.contains(service_id)
        {
            plan.set("service_id", config.scoped(rc.future_scope, service_id));
        }
        return plan;
    }

    let key = ScopedKey::new("trips", frame.scope, trip_id);
    if rc.plan.skip_active_trips.contains(trip_id) {
        tracing::debug!(trip_id, "older trip matches newer trip; keeping newer");
        return RowPlan::skip(SkipReason::Superseded, Some(key));
    }

    let planned = rc.plan.scope_active_trips.contains(trip_id);
    let collides = !planned && rc.future.trip_ids.contains(trip_id);
    if planned || collides {
        if collides {
            result.conflict("trips", "trip_id", trip_id);
        }
        let scoped = config.scoped(frame.scope, trip_id);
        result.remap(key, scoped.clone());
        plan.set("trip_id", scoped);
    }
    plan
}
