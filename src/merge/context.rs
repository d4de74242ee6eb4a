//! State shared by every table of one merge run.

use chrono::NaiveDate;

use crate::archive::{FeedIds, FeedToMerge};
use crate::config::MergeConfig;
use crate::error::{MergeError, MergeFailure};
use crate::feed::MergeType;
use crate::registry::ReferenceRegistry;

use super::result::MergeResult;
use super::strategy::StrategyPlan;

/// How a feed takes part in the merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedRole {
    /// One of several unrelated feeds in a namespace merge.
    Peer,
    /// The newer version in a reconciling merge.
    Future,
    /// The older version in a reconciling merge.
    Active,
}

/// Read-only inputs for the whole run.
#[derive(Debug)]
pub struct MergeContext<'a> {
    pub merge_type: MergeType,
    pub config: &'a MergeConfig,
    /// Feeds in processing order: newest first.
    pub feeds: &'a [FeedToMerge],
    /// Present for reconciling merges.
    pub reconcile: Option<Reconcile<'a>>,
}

impl MergeContext<'_> {
    #[must_use]
    pub fn role(&self, feed_index: usize) -> FeedRole {
        match (self.merge_type, feed_index) {
            (MergeType::Namespace, _) => FeedRole::Peer,
            (MergeType::Reconciling, 0) => FeedRole::Future,
            (MergeType::Reconciling, _) => FeedRole::Active,
        }
    }

    /// Whether `service_id`, read from a feed with `role`, is also an id of
    /// the newer feed. An older row keeping such an id unchanged would join
    /// the newer service.
    #[must_use]
    pub fn shadows_service(&self, role: FeedRole, service_id: &str) -> bool {
        role == FeedRole::Active
            && self
                .reconcile
                .as_ref()
                .is_some_and(|rc| rc.future.service_ids.contains(service_id))
    }
}

/// What a reconciling merge knows before it writes anything.
#[derive(Debug)]
pub struct Reconcile<'a> {
    pub plan: &'a StrategyPlan,
    pub future: &'a FeedIds,
    pub active: &'a FeedIds,
    pub future_scope: &'a str,
    /// First service date of the newer feed. Older calendar rows end the
    /// day before.
    pub cutoff: NaiveDate,
    /// Older `calendar_dates` rows on or after this date are dropped. The
    /// later of `cutoff` and the newer feed's earliest calendar start.
    pub exception_cutoff: NaiveDate,
}

/// Mutable state threaded through every table.
#[derive(Debug)]
pub struct RunState {
    pub registry: ReferenceRegistry,
    pub result: MergeResult,
    /// `agency_id` synthesized for each feed whose single agency has none.
    pub agency_ids: Vec<Option<String>>,
}

impl RunState {
    #[must_use]
    pub fn new(result: MergeResult, feed_count: usize) -> Self {
        Self {
            registry: ReferenceRegistry::new(),
            result,
            agency_ids: vec![None; feed_count],
        }
    }
}

/// Why processing stopped early.
#[derive(Debug)]
pub enum Halt {
    /// The merge could not run.
    Error(MergeError),
    /// The merge ran into a condition that makes its output unsafe.
    Failure(MergeFailure),
}

impl From<MergeError> for Halt {
    fn from(err: MergeError) -> Self {
        Self::Error(err)
    }
}

impl From<MergeFailure> for Halt {
    fn from(failure: MergeFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Result of a step that may halt the merge.
pub type Flow<T> = Result<T, Halt>;
