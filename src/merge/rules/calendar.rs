//! `calendar` rows in a reconciling merge.
//!
//! Newer-feed rows may have their start pulled back to cover the older
//! feed's dates. Older-feed rows are cut off the day before the newer feed
//! begins, dropped if they start after that, and scoped when their service
//! id is also defined by the newer feed.

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::feed::format_date;
use crate::merge::context::{FeedRole, Reconcile};
use crate::merge::frame::{RowFrame, RowPlan, SkipReason};
use crate::merge::result::{MergeResult, ScopedKey};

pub fn plan_row(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
    result: &mut MergeResult,
) -> Result<RowPlan, MergeError> {
    match frame.role {
        FeedRole::Active => plan_active(frame, rc, config, result),
        FeedRole::Future | FeedRole::Peer => plan_future(frame, rc, config),
    }
}

fn plan_future(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
) -> Result<RowPlan, MergeError> {
    let service_id = frame.key();
    let mut plan = RowPlan::keep();

    if rc.plan.extend_services.contains(service_id)
        && let Some(active) = rc.active.calendar_ranges.get(service_id)
    {
        let start = frame.date("start_date")?;
        if active.start < start {
            tracing::debug!(
                service_id,
                from = %format_date(start),
                to = %format_date(active.start),
                "extending service start to cover older feed"
            );
            plan.set("start_date", format_date(active.start));
        }
    }

    if rc.plan.clone_future_services.contains(service_id) {
        plan.copy_with("service_id", config.scoped(frame.scope, service_id));
    }
    Ok(plan)
}

fn plan_active(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
    result: &mut MergeResult,
) -> Result<RowPlan, MergeError> {
    let service_id = frame.key();
    let key = ScopedKey::service(frame.scope, service_id);
    if rc.plan.remove_active_services.contains(service_id) {
        return Ok(RowPlan::skip(SkipReason::Unused, Some(key)));
    }

    let start = frame.date("start_date")?;
    let end = frame.date("end_date")?;
    if start >= rc.cutoff {
        tracing::warn!(
            service_id,
            start = %format_date(start),
            cutoff = %format_date(rc.cutoff),
            "older service starts after newer feed begins; dropping"
        );
        return Ok(RowPlan::skip(SkipReason::Expired, Some(key)));
    }

    let mut plan = RowPlan::keep();
    if end >= rc.cutoff
        && let Some(day_before) = rc.cutoff.pred_opt()
    {
        plan.set("end_date", format_date(day_before));
    }
    if rc.future.service_ids.contains(service_id) {
        let scoped = config.scoped(frame.scope, service_id);
        result.remap(key, scoped.clone());
        plan.set("service_id", scoped);
    }
    Ok(plan)
}
