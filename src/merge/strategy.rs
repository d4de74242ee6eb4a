//! Choosing how two versions of a feed are reconciled.
//!
//! The decision looks only at the id sets each archive defines, plus, for
//! trips both versions share, the ordered stops each trip visits:
//!
//! 1. Both feeds define the same (non-empty) trips but different services:
//!    fail.
//! 2. A shared trip runs on a different service in each feed: fail.
//! 3. Same trips, same services: [`MergeStrategy::ExtendFuture`]. The older
//!    feed contributes nothing but its service dates.
//! 4. Same services, different trips: [`MergeStrategy::CheckStopTimes`].
//!    Shared trips whose stops match are taken from the newer feed with their
//!    service extended backwards; the rest keep both versions apart.
//! 5. Anything else: [`MergeStrategy::Default`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::archive::{FeedIds, StopVisit};
use crate::error::{MergeError, MergeFailure};

/// The reconciling strategy picked for a merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Keep both feeds, truncating the older one where the newer begins.
    #[default]
    Default,
    /// The feeds are the same schedule; stretch the newer one backwards.
    ExtendFuture,
    /// The feeds disagree about which service a trip runs on.
    FailOnTripConflict,
    /// Match shared trips by their stop sequences.
    CheckStopTimes,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::ExtendFuture => write!(f, "extend-future"),
            Self::FailOnTripConflict => write!(f, "fail-on-trip-conflict"),
            Self::CheckStopTimes => write!(f, "check-stop-times"),
        }
    }
}

/// Stop visits per trip id.
pub type Signatures = BTreeMap<String, Vec<StopVisit>>;

/// The chosen strategy and the id sets it acts on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrategyPlan {
    pub strategy: MergeStrategy,
    /// Why the merge cannot proceed, for [`MergeStrategy::FailOnTripConflict`].
    pub failure: Option<MergeFailure>,
    /// Older-feed trips identical to a newer-feed trip; not written.
    pub skip_active_trips: BTreeSet<String>,
    /// Older-feed trips that share an id with a different newer-feed trip;
    /// written under a scoped id.
    pub scope_active_trips: BTreeSet<String>,
    /// Newer-feed services whose start date is pulled back to the older
    /// feed's start date.
    pub extend_services: BTreeSet<String>,
    /// Extended services that also carry newer-only trips. Those trips move
    /// to a scoped clone of the service with the original dates.
    pub clone_future_services: BTreeSet<String>,
    /// Older-feed services used only by skipped trips; not written.
    pub remove_active_services: BTreeSet<String>,
}

impl StrategyPlan {
    fn failed(failure: MergeFailure) -> Self {
        Self {
            strategy: MergeStrategy::FailOnTripConflict,
            failure: Some(failure),
            ..Self::default()
        }
    }
}

/// Pick a strategy for merging `active` (older) into `future` (newer).
///
/// `signatures` is called at most once, with the trip ids both feeds share,
/// and returns `(future, active)` stop visits for them.
///
/// # Errors
/// Propagates errors from `signatures`.
pub fn resolve_strategy<F>(
    future: &FeedIds,
    active: &FeedIds,
    signatures: F,
) -> Result<StrategyPlan, MergeError>
where
    F: FnOnce(&BTreeSet<String>) -> Result<(Signatures, Signatures), MergeError>,
{
    let trips_match = future.trip_ids == active.trip_ids;
    let services_match = future.service_ids == active.service_ids;

    if trips_match && !future.trip_ids.is_empty() && !services_match {
        return Ok(StrategyPlan::failed(
            MergeFailure::MatchingTripsDifferentServices {
                trip_count: future.trip_ids.len(),
            },
        ));
    }

    let shared: BTreeSet<String> = future
        .trip_ids
        .intersection(&active.trip_ids)
        .cloned()
        .collect();
    for trip_id in &shared {
        let future_service = future.trip_services.get(trip_id);
        let active_service = active.trip_services.get(trip_id);
        if future_service != active_service {
            return Ok(StrategyPlan::failed(MergeFailure::TripServiceConflict {
                trip_id: trip_id.clone(),
                future_service: future_service.cloned().unwrap_or_default(),
                active_service: active_service.cloned().unwrap_or_default(),
            }));
        }
    }

    if trips_match && services_match {
        return Ok(StrategyPlan {
            strategy: MergeStrategy::ExtendFuture,
            extend_services: future.service_ids.clone(),
            ..StrategyPlan::default()
        });
    }

    if !services_match {
        return Ok(StrategyPlan::default());
    }

    let (future_sigs, active_sigs) = signatures(&shared)?;
    let mut plan = StrategyPlan {
        strategy: MergeStrategy::CheckStopTimes,
        ..StrategyPlan::default()
    };
    for trip_id in &shared {
        if future_sigs.get(trip_id) == active_sigs.get(trip_id) {
            plan.skip_active_trips.insert(trip_id.clone());
            if let Some(service) = future.trip_services.get(trip_id) {
                plan.extend_services.insert(service.clone());
            }
        } else {
            plan.scope_active_trips.insert(trip_id.clone());
        }
    }

    for (trip_id, service) in &future.trip_services {
        if !active.trip_ids.contains(trip_id) && plan.extend_services.contains(service) {
            plan.clone_future_services.insert(service.clone());
        }
    }

    for service in &active.service_ids {
        let mut trips = active.trips_on(service).peekable();
        if trips.peek().is_some() && trips.all(|t| plan.skip_active_trips.contains(t)) {
            plan.remove_active_services.insert(service.clone());
        }
    }

    Ok(plan)
}
