//! `calendar_dates` rows in a reconciling merge.
//!
//! Older-feed exceptions dated before the newer feed's first day are kept
//! (scoped when their service id collides). When the matching newer-feed
//! service was extended backwards, the exception is also copied onto it so
//! the extended service keeps the older feed's holidays.

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::feed::format_date;
use crate::merge::context::{FeedRole, Reconcile};
use crate::merge::frame::{RowFrame, RowPlan, SkipReason};
use crate::merge::result::{MergeResult, ScopedKey};
use crate::merge::strategy::MergeStrategy;

pub fn plan_row(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
    result: &mut MergeResult,
) -> Result<RowPlan, MergeError> {
    let service_id = frame.key();

    if frame.role != FeedRole::Active {
        let mut plan = RowPlan::keep();
        if rc.plan.clone_future_services.contains(service_id) {
            plan.copy_with("service_id", config.scoped(frame.scope, service_id));
        }
        return Ok(plan);
    }

    let date = frame.date("date")?;
    let carry_over =
        rc.plan.extend_services.contains(service_id) && date < rc.exception_cutoff;

    let mut plan = if rc.plan.strategy == MergeStrategy::ExtendFuture {
        RowPlan::skip(SkipReason::Superseded, None)
    } else {
        plan_scoped_copy(frame, rc, config, result, date)
    };
    if carry_over {
        plan.copy_with("service_id", service_id.to_owned());
    }
    Ok(plan)
}

fn plan_scoped_copy(
    frame: &RowFrame<'_>,
    rc: &Reconcile<'_>,
    config: &MergeConfig,
    result: &mut MergeResult,
    date: chrono::NaiveDate,
) -> RowPlan {
    let service_id = frame.key();
    if rc.plan.remove_active_services.contains(service_id) {
        return RowPlan::skip(SkipReason::Unused, Some(frame.scoped_key()));
    }
    if date >= rc.exception_cutoff {
        tracing::debug!(
            service_id,
            date = %format_date(date),
            "older exception falls inside newer feed; dropping"
        );
        return RowPlan::skip(SkipReason::Expired, Some(frame.scoped_key()));
    }

    let mut plan = RowPlan::keep();
    if rc.future.service_ids.contains(service_id) {
        let scoped = config.scoped(frame.scope, service_id);
        result.remap(ScopedKey::service(frame.scope, service_id), scoped.clone());
        plan.set("service_id", scoped);
    }
    plan
}
