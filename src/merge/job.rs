//! Running a whole merge: validate inputs, pick a strategy, merge every
//! table, and publish the archive.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use gtfs_schema::Schema;
use tracing::{info, warn};

use crate::archive::{FeedIds, FeedToMerge};
use crate::config::MergeConfig;
use crate::error::{MergeError, MergeFailure};
use crate::feed::{FeedVersion, MergeType, format_date};

use super::context::{Halt, MergeContext, Reconcile, RunState};
use super::line::LineMerger;
use super::progress::ProgressSink;
use super::result::MergeResult;
use super::strategy::{StrategyPlan, resolve_strategy};
use super::writer::OutputArchive;

/// Everything a reconciling merge decides before writing.
struct Prepared {
    plan: StrategyPlan,
    future: FeedIds,
    active: FeedIds,
    cutoff: NaiveDate,
    exception_cutoff: NaiveDate,
}

/// Merge `versions` into a single archive at `output`.
///
/// Feeds are processed newest first. A version listed more than once (same
/// id and archive) is merged once. The returned result has `failed` set
/// when the inputs could not be merged safely; in that case nothing is
/// written to `output`.
///
/// # Errors
/// Returns an error for invalid input (no feeds, a reconciling merge of
/// anything other than two feeds, a feed without a first service date,
/// clashing id scopes) and for I/O failures.
pub fn merge_feeds(
    mut versions: Vec<FeedVersion>,
    merge_type: MergeType,
    config: &MergeConfig,
    output: &Path,
    schema: &Schema,
    progress: &mut dyn ProgressSink,
) -> Result<MergeResult, MergeError> {
    let _run = tracing::info_span!("merge", %merge_type).entered();
    dedup_versions(&mut versions);
    validate(&versions, merge_type)?;
    versions.sort_by(|a, b| b.first_date.cmp(&a.first_date));

    info!(
        %merge_type,
        feeds = versions.len(),
        output = %output.display(),
        "merging feeds"
    );
    let mut result = MergeResult::new(merge_type, versions.len());

    let mut feeds = Vec::with_capacity(versions.len());
    for version in versions {
        let id = version.id.clone();
        match FeedToMerge::open(version) {
            Ok(feed) => feeds.push(feed),
            Err(err) => {
                let failure = MergeFailure::UnreadableArchive {
                    feed: id,
                    reason: err.to_string(),
                };
                return Ok(abort(result, &failure, progress));
            }
        }
    }

    for feed in &feeds {
        for entry in unknown_entries(feed, schema) {
            warn!(feed = %feed.version.id, %entry, "archive entry is not a known table; ignoring");
            result
                .ignored_entries
                .insert(format!("{}/{entry}", feed.version.id));
        }
    }

    let prepared = match merge_type {
        MergeType::Namespace => None,
        MergeType::Reconciling => {
            let prepared = prepare(&mut feeds)?;
            result.strategy = Some(prepared.plan.strategy);
            info!(
                strategy = %prepared.plan.strategy,
                cutoff = %format_date(prepared.cutoff),
                "strategy selected"
            );
            if let Some(failure) = &prepared.plan.failure {
                return Ok(abort(result, failure, progress));
            }
            Some(prepared)
        }
    };

    let ctx = MergeContext {
        merge_type,
        config,
        feeds: &feeds,
        reconcile: prepared.as_ref().map(|p| Reconcile {
            plan: &p.plan,
            future: &p.future,
            active: &p.active,
            future_scope: &feeds[0].scope,
            cutoff: p.cutoff,
            exception_cutoff: p.exception_cutoff,
        }),
    };

    let tables: Vec<_> = schema
        .tables()
        .iter()
        .filter(|t| !config.skips(t.name))
        .filter(|t| {
            t.name != "feed_info" || merge_type != MergeType::Namespace || config.include_feed_info
        })
        .collect();

    let mut archive = OutputArchive::create(output)?;
    let mut state = RunState::new(result, feeds.len());
    #[allow(clippy::cast_precision_loss)]
    let total = tables.len() as f64;

    for (n, table) in tables.iter().enumerate() {
        let _table = tracing::info_span!("table", table = table.name).entered();
        let inputs = feeds
            .iter()
            .map(|f| f.archive.read_table(table.name))
            .collect::<Result<Vec<_>, _>>()?;

        match LineMerger::new(&ctx, table, inputs).run(output, &mut state) {
            Ok(Some(table_output)) => {
                state
                    .result
                    .lines_per_table
                    .insert(table_output.table.clone(), table_output.lines);
                archive.add_table(&table_output)?;
            }
            Ok(None) => {
                state.result.lines_per_table.insert(table.name.to_owned(), 0);
            }
            Err(Halt::Error(err)) => return Err(err),
            Err(Halt::Failure(failure)) => {
                warn!(table = table.name, %failure, "merge failed");
                drop(archive);
                return Ok(abort(state.result, &failure, progress));
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let percent = (n + 1) as f64 / total * 100.0;
        progress.update(percent, &format!("merged {}", table.file_name()));
    }

    archive.persist()?;
    let result = state.result;
    info!(
        tables = result.lines_per_table.len(),
        skipped = result.records_skipped,
        remapped = result.remapped_references,
        "merge complete"
    );
    progress.finish(true, &format!("merged {} feeds", result.feed_count));
    Ok(result)
}

/// Drop repeated listings of the same version, keeping the first.
fn dedup_versions(versions: &mut Vec<FeedVersion>) {
    let mut seen = BTreeSet::new();
    versions.retain(|v| {
        let fresh = seen.insert((v.id.clone(), v.archive_path.clone()));
        if !fresh {
            tracing::debug!(feed = %v.id, "feed listed more than once; merging it once");
        }
        fresh
    });
}

/// Entries of `feed` that are neither a schema table nor a directory.
fn unknown_entries(feed: &FeedToMerge, schema: &Schema) -> Vec<String> {
    feed.archive
        .entry_names()
        .into_iter()
        .filter(|name| {
            name.strip_suffix(".txt")
                .is_none_or(|table| !schema.contains(table))
        })
        .collect()
}

fn validate(versions: &[FeedVersion], merge_type: MergeType) -> Result<(), MergeError> {
    if versions.is_empty() {
        return Err(MergeError::invalid_input("no feeds to merge"));
    }
    if merge_type == MergeType::Reconciling && versions.len() != 2 {
        return Err(MergeError::invalid_input(format!(
            "a {merge_type} merge takes exactly 2 feeds, got {}",
            versions.len()
        )));
    }
    if let Some(version) = versions.iter().find(|v| v.first_date.is_none()) {
        return Err(MergeError::invalid_input(format!(
            "feed '{}' has no first service date",
            version.id
        )));
    }
    let mut scopes = BTreeSet::new();
    for version in versions {
        let scope = version.id_scope();
        if !scopes.insert(scope.clone()) {
            return Err(MergeError::invalid_input(format!(
                "feed '{}' has id scope '{scope}', which another feed already uses; \
                 give each feed a distinct source name or version",
                version.id
            )));
        }
    }
    Ok(())
}

/// Scan both feeds of a reconciling merge and choose how to combine them.
fn prepare(feeds: &mut [FeedToMerge]) -> Result<Prepared, MergeError> {
    let [future_feed, active_feed] = feeds else {
        return Err(MergeError::invalid_input("a reconciling merge takes exactly 2 feeds"));
    };
    let future = future_feed.scan()?.clone();
    let active = active_feed.scan()?.clone();

    let plan = resolve_strategy(&future, &active, |shared| {
        Ok((
            future_feed.archive.stop_time_signatures(shared)?,
            active_feed.archive.stop_time_signatures(shared)?,
        ))
    })?;

    let cutoff = future_feed
        .version
        .first_date
        .ok_or_else(|| MergeError::invalid_input("newer feed has no first service date"))?;
    let exception_cutoff = future
        .earliest_calendar_start
        .map_or(cutoff, |start| start.max(cutoff));

    Ok(Prepared {
        plan,
        future,
        active,
        cutoff,
        exception_cutoff,
    })
}

fn abort(
    mut result: MergeResult,
    failure: &MergeFailure,
    progress: &mut dyn ProgressSink,
) -> MergeResult {
    warn!(%failure, "merge aborted; output not written");
    result.fail(failure);
    progress.finish(false, &failure.to_string());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;
    use crate::merge::progress::NoopProgress;
    use crate::merge::progress::tests::RecordingProgress;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
    }

    fn version(dir: &Path, source: &str, n: u32, first: &str) -> FeedVersion {
        FeedVersion::new(
            format!("{source}-{n}"),
            source,
            n,
            dir.join(format!("{source}{n}.zip")),
        )
        .with_service_range(date(first), date("20251231"))
    }

    #[test]
    fn empty_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge_feeds(
            Vec::new(),
            MergeType::Namespace,
            &MergeConfig::default(),
            &dir.path().join("out.zip"),
            &Schema::default(),
            &mut NoopProgress,
        )
        .unwrap_err();
        assert!(matches!(err, MergeError::InvalidInput { .. }));
    }

    #[test]
    fn reconciling_needs_two_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let versions = vec![
            version(dir.path(), "bart", 1, "20240101"),
            version(dir.path(), "bart", 2, "20240301"),
            version(dir.path(), "bart", 3, "20240601"),
        ];
        let err = merge_feeds(
            versions,
            MergeType::Reconciling,
            &MergeConfig::default(),
            &dir.path().join("out.zip"),
            &Schema::default(),
            &mut NoopProgress,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly 2 feeds"));
    }

    #[test]
    fn missing_first_date_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let versions = vec![FeedVersion::new("bart-1", "bart", 1, dir.path().join("a.zip"))];
        let err = validate(&versions, MergeType::Namespace).unwrap_err();
        assert!(err.to_string().contains("bart-1"));
    }

    #[test]
    fn clashing_scopes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut other = version(dir.path(), "bart", 1, "20240301");
        other.id = "bart-1-reissue".into();
        other.archive_path = dir.path().join("bart1-reissue.zip");
        let mut versions = vec![version(dir.path(), "bart", 1, "20240101"), other];
        dedup_versions(&mut versions);
        let err = validate(&versions, MergeType::Namespace).unwrap_err();
        assert!(err.to_string().contains("bart1"));
    }

    #[test]
    fn repeated_versions_are_merged_once() {
        let dir = tempfile::tempdir().unwrap();
        let bart = version(dir.path(), "bart", 1, "20240101");
        let muni = version(dir.path(), "muni", 1, "20240101");
        let mut versions = vec![bart.clone(), muni, bart];
        dedup_versions(&mut versions);
        let ids: Vec<_> = versions.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["bart-1", "muni-1"]);
        validate(&versions, MergeType::Namespace).unwrap();
    }

    #[test]
    fn unreadable_archive_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let good = version(dir.path(), "bart", 1, "20240101");
        write_zip(&good.archive_path, &[("agency", "agency_id,agency_name\nA,A\n")]);
        let missing = version(dir.path(), "muni", 1, "20240101");
        let output = dir.path().join("out.zip");
        let mut progress = RecordingProgress::default();

        let result = merge_feeds(
            vec![good, missing],
            MergeType::Namespace,
            &MergeConfig::default(),
            &output,
            &Schema::default(),
            &mut progress,
        )
        .unwrap();

        assert!(result.failed);
        assert_eq!(result.error_count, 1);
        assert!(
            result
                .failure_reasons
                .iter()
                .any(|r| r.contains("muni-1"))
        );
        assert!(!output.exists());
        assert_eq!(progress.finished.map(|(ok, _)| ok), Some(false));
    }

    #[test]
    fn feeds_are_processed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let older = version(dir.path(), "bart", 1, "20240101");
        let newer = version(dir.path(), "bart", 2, "20240301");
        let agency = "agency_id,agency_name,agency_url,agency_timezone\n\
                      BART,BART,https://bart.example,America/Los_Angeles\n";
        write_zip(&older.archive_path, &[("agency", agency)]);
        write_zip(&newer.archive_path, &[("agency", agency)]);
        let output = dir.path().join("out.zip");
        let mut progress = RecordingProgress::default();

        let result = merge_feeds(
            vec![older, newer],
            MergeType::Namespace,
            &MergeConfig::default(),
            &output,
            &Schema::default(),
            &mut progress,
        )
        .unwrap();

        assert!(!result.failed);
        assert_eq!(result.lines_per_table.get("agency"), Some(&2));
        let body = crate::archive::FeedArchive::open(&output)
            .unwrap()
            .read_table("agency")
            .unwrap()
            .unwrap();
        let ids: Vec<_> = body
            .records()
            .iter()
            .map(|r| body.value(r, "agency_id").to_owned())
            .collect();
        assert_eq!(ids, ["bart2:BART", "bart1:BART"]);
        assert_eq!(progress.finished.map(|(ok, _)| ok), Some(true));
        assert!(progress.updates.last().is_some_and(|(p, _)| (*p - 100.0).abs() < 1e-9));
    }
}
