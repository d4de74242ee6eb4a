//! `feedmerge merge`: merge feed archives named on the command line.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use gtfs_schema::Schema;

use feedmerge::archive::FeedArchive;
use feedmerge::config::FeedmergeConfig;
use feedmerge::feed::{FeedVersion, MergeType, parse_date};
use feedmerge::merge::{MergeResult, TracingProgress, merge_feeds};

/// Arguments for `feedmerge merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Merge type: `namespace` (alias `regional`) or `reconciling`
    /// (alias `service-period`). Defaults to `merge.type` from the config.
    #[arg(long = "type", value_name = "TYPE")]
    pub merge_type: Option<MergeType>,

    /// Path of the merged zip archive.
    #[arg(long, short, value_name = "ZIP")]
    pub out: PathBuf,

    /// Write the merge result as JSON to this path.
    #[arg(long, value_name = "JSON")]
    pub report: Option<PathBuf>,

    /// Feeds to merge, each as
    /// `source=<name>,version=<n>,path=<zip>[,first=<YYYYMMDD>][,last=<YYYYMMDD>][,id=<id>]`.
    #[arg(required = true, value_name = "FEED")]
    pub feeds: Vec<FeedSpec>,
}

/// One `FEED` argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedSpec {
    pub id: Option<String>,
    pub source: String,
    pub version: u32,
    pub path: PathBuf,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl FromStr for FeedSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut id = None;
        let mut source = None;
        let mut version = None;
        let mut path = None;
        let mut first = None;
        let mut last = None;

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(format!("expected key=value, got '{part}'"));
            };
            let value = value.trim();
            match key.trim() {
                "id" => id = Some(value.to_owned()),
                "source" => source = Some(value.to_owned()),
                "version" => {
                    version = Some(
                        value
                            .parse::<u32>()
                            .map_err(|e| format!("invalid version '{value}': {e}"))?,
                    );
                }
                "path" => path = Some(PathBuf::from(value)),
                "first" => first = Some(feed_date("first", value)?),
                "last" => last = Some(feed_date("last", value)?),
                other => {
                    return Err(format!(
                        "unknown key '{other}' (expected source, version, path, first, last, id)"
                    ));
                }
            }
        }

        Ok(Self {
            id,
            source: source.ok_or("missing source=<name>")?,
            version: version.ok_or("missing version=<n>")?,
            path: path.ok_or("missing path=<zip>")?,
            first,
            last,
        })
    }
}

fn feed_date(key: &str, value: &str) -> Result<NaiveDate, String> {
    parse_date("feed", key, value).map_err(|e| e.to_string())
}

impl FeedSpec {
    /// Resolve into a [`FeedVersion`], scanning the archive for any service
    /// date not given on the command line.
    fn into_version(self) -> Result<FeedVersion> {
        let id = self
            .id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.source, self.version));
        let (first, last) = match (self.first, self.last) {
            (Some(first), Some(last)) => (first, last),
            (first, last) => {
                let range = scan_service_range(&self.path)
                    .with_context(|| format!("deriving service dates for feed '{id}'"))?;
                (first.unwrap_or(range.0), last.unwrap_or(range.1))
            }
        };
        Ok(FeedVersion::new(id, self.source, self.version, self.path)
            .with_service_range(first, last))
    }
}

fn scan_service_range(path: &Path) -> Result<(NaiveDate, NaiveDate)> {
    let archive = FeedArchive::open(path)?;
    let ids = archive.scan_ids()?;
    let Some(range) = ids.service_range else {
        bail!(
            "{} has no calendar or calendar_dates rows\n  \
             To fix: pass first=<YYYYMMDD>,last=<YYYYMMDD> with the feed",
            path.display()
        );
    };
    Ok((range.start, range.end))
}

/// Run `feedmerge merge`.
pub fn run(args: MergeArgs, config: &FeedmergeConfig) -> Result<()> {
    let merge_type = args.merge_type.unwrap_or(config.merge.merge_type);
    let versions = args
        .feeds
        .into_iter()
        .map(FeedSpec::into_version)
        .collect::<Result<Vec<_>>>()?;

    let result = merge_feeds(
        versions,
        merge_type,
        &config.merge,
        &args.out,
        &Schema::default(),
        &mut TracingProgress,
    )
    .context("merge failed")?;

    if let Some(report) = &args.report {
        let json = result.to_json().context("serializing merge result")?;
        std::fs::write(report, json)
            .with_context(|| format!("writing report to {}", report.display()))?;
    }

    println!("{}", summary(&result, &args.out));
    if result.failed {
        bail!("merge failed; {} was not written", args.out.display());
    }
    Ok(())
}

fn summary(result: &MergeResult, out: &Path) -> String {
    if result.failed {
        let mut text = format!("{} merge of {} feeds failed:", result.merge_type, result.feed_count);
        for reason in &result.failure_reasons {
            let _ = write!(text, "\n  - {reason}");
        }
        return text;
    }
    let lines: usize = result.lines_per_table.values().sum();
    let mut text = format!(
        "{} merge of {} feeds -> {}: {} tables, {lines} rows, {} skipped, {} references remapped",
        result.merge_type,
        result.feed_count,
        out.display(),
        result.lines_per_table.values().filter(|n| **n > 0).count(),
        result.records_skipped,
        result.remapped_references,
    );
    if let Some(strategy) = result.strategy {
        let _ = write!(text, " (strategy: {strategy})");
    }
    text
}
