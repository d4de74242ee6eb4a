//! `agency` rows: synthesized ids and cross-version agency checks.

use sha2::{Digest, Sha256};

use crate::archive::TableData;
use crate::error::MergeFailure;
use crate::feed::MergeType;
use crate::merge::context::{FeedRole, Flow, MergeContext, RunState};
use crate::merge::frame::RowFrame;

/// Hex digits of the scope hash kept in a synthesized agency id.
const SYNTHESIZED_ID_LEN: usize = 12;

/// A stable `agency_id` for a feed whose only agency has none.
#[must_use]
pub fn synthesize_agency_id(scope: &str) -> String {
    let digest = Sha256::digest(scope.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("agency-{}", &hex[..SYNTHESIZED_ID_LEN])
}

fn blank_ids(data: &TableData) -> usize {
    data.records()
        .iter()
        .filter(|r| data.value(r, "agency_id").is_empty())
        .count()
}

/// Synthesize ids for feeds written into the agency table.
///
/// A single agency without an id gets one derived from the feed's scope, and
/// blank `agency_id` references elsewhere in that feed are filled with it.
/// Several agencies without ids cannot be told apart; in a namespace merge
/// that fails the run.
///
/// # Errors
/// Halts with [`MergeFailure::MultipleAgenciesWithoutId`].
pub fn start_table(
    ctx: &MergeContext<'_>,
    inputs: &[Option<TableData>],
    state: &mut RunState,
) -> Flow<()> {
    for (idx, data) in inputs.iter().enumerate() {
        let Some(data) = data else { continue };
        if ctx.role(idx) == FeedRole::Active {
            continue;
        }
        let blanks = blank_ids(data);
        if blanks == 0 {
            continue;
        }
        let feed = &ctx.feeds[idx];
        if data.records().len() == 1 {
            let id = synthesize_agency_id(&feed.scope);
            tracing::info!(feed = %feed.version.id, agency_id = %id, "synthesized agency_id");
            state.agency_ids[idx] = Some(id);
        } else if ctx.merge_type == MergeType::Namespace {
            return Err(MergeFailure::MultipleAgenciesWithoutId {
                feed: feed.version.id.clone(),
                count: blanks,
            }
            .into());
        } else {
            tracing::warn!(feed = %feed.version.id, count = blanks, "agencies without agency_id");
        }
    }
    Ok(())
}

/// Before the older feed's agency rows are checked: its single unnamed
/// agency is taken to be the newer feed's agency.
pub fn start_older_feed(data: &TableData, feed_index: usize, state: &mut RunState) {
    if data.records().len() != 1 || blank_ids(data) != 1 {
        return;
    }
    let id = state.agency_ids[0]
        .clone()
        .or_else(|| state.registry.any_value("agency", "agency_id").map(str::to_owned));
    state.agency_ids[feed_index] = id;
}

/// An older-feed agency must already exist in the newer feed.
///
/// # Errors
/// Halts with [`MergeFailure::AgencyMismatch`].
pub fn check_row(frame: &RowFrame<'_>, state: &RunState) -> Flow<()> {
    let agency_id = frame.source("agency_id");
    if agency_id.is_empty() || state.registry.contains("agency", "agency_id", agency_id) {
        return Ok(());
    }
    Err(MergeFailure::AgencyMismatch {
        active_agency: agency_id.to_owned(),
        future_agency: state
            .registry
            .any_value("agency", "agency_id")
            .unwrap_or_default()
            .to_owned(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ids_are_stable_and_scope_specific() {
        let a = synthesize_agency_id("Muni1");
        assert_eq!(a, synthesize_agency_id("Muni1"));
        assert_ne!(a, synthesize_agency_id("Muni2"));
        assert!(a.starts_with("agency-"));
        assert_eq!(a.len(), "agency-".len() + SYNTHESIZED_ID_LEN);
    }
}
