//! Shared helpers for feedmerge integration tests.
//!
//! Every test builds its feeds as real zip archives inside its own temp
//! directory and reads the merged archive back from there.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use feedmerge::archive::FeedArchive;
use feedmerge::config::MergeConfig;
use feedmerge::feed::{FeedVersion, MergeType};
use feedmerge::merge::{MergeResult, NoopProgress, merge_feeds};
use gtfs_schema::{Reference, Schema};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// A temp directory holding input feeds and the merged output.
pub struct FeedDir {
    dir: TempDir,
}

impl FeedDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where merges in this directory write their archive.
    pub fn output(&self) -> PathBuf {
        self.dir.path().join("merged.zip")
    }

    /// Write a feed archive and describe it as a version covering
    /// `first..=last`.
    pub fn feed(
        &self,
        source: &str,
        version: u32,
        first: &str,
        last: &str,
        tables: &[(&str, &str)],
    ) -> FeedVersion {
        let path = self
            .dir
            .path()
            .join(format!("{}-{version}.zip", source.replace(' ', "_")));
        write_zip(&path, tables);
        FeedVersion::new(format!("{source}-{version}"), source, version, path)
            .with_service_range(date(first), date(last))
    }
}

/// Write a zip with one `<name>.txt` entry per `(name, csv)` pair.
pub fn write_zip(path: &Path, tables: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in tables {
        zip.start_file(format!("{name}.txt"), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
}

/// Merge with default configuration.
pub fn merge(versions: Vec<FeedVersion>, merge_type: MergeType, output: &Path) -> MergeResult {
    merge_feeds(
        versions,
        merge_type,
        &MergeConfig::default(),
        output,
        &Schema::default(),
        &mut NoopProgress,
    )
    .expect("merge returned an error")
}

/// Rows of `table` in the archive at `path`, as field → value maps.
/// Empty when the table is absent.
pub fn rows(path: &Path, table: &str) -> Vec<BTreeMap<String, String>> {
    let archive = FeedArchive::open(path).unwrap();
    let Some(data) = archive.read_table(table).unwrap() else {
        return Vec::new();
    };
    data.records()
        .iter()
        .map(|record| {
            data.headers()
                .iter()
                .map(|h| (h.clone(), data.value(record, h).to_owned()))
                .collect()
        })
        .collect()
}

/// One column of `table`, in row order.
pub fn column(path: &Path, table: &str, field: &str) -> Vec<String> {
    rows(path, table)
        .into_iter()
        .map(|mut row| row.remove(field).unwrap_or_default())
        .collect()
}

/// The row of `table` whose `field` is `value`.
pub fn find_row(path: &Path, table: &str, field: &str, value: &str) -> BTreeMap<String, String> {
    rows(path, table)
        .into_iter()
        .find(|row| row.get(field).is_some_and(|v| v == value))
        .unwrap_or_else(|| panic!("no {table} row with {field} = {value}"))
}

/// Assert the archive has unique keys and no dangling references.
pub fn assert_closed(path: &Path) {
    let schema = Schema::default();
    let mut keys: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

    for table in schema.tables() {
        let table_rows = rows(path, table.name);
        let Some(key) = table.key_field else { continue };
        let mut seen = BTreeSet::new();
        for row in &table_rows {
            let value = row.get(key).cloned().unwrap_or_default();
            let identity = match table.order_field {
                Some(order) => format!("{value}#{}", row.get(order).cloned().unwrap_or_default()),
                None => value.clone(),
            };
            assert!(
                seen.insert(identity.clone()),
                "{} has duplicate key {identity}",
                table.name
            );
            keys.entry(table.name).or_default().insert(value);
        }
    }

    for table in schema.tables() {
        for row in rows(path, table.name) {
            for field in table.fields {
                let Some(target) = field.reference else { continue };
                let value = row.get(field.name).cloned().unwrap_or_default();
                if value.is_empty() {
                    continue;
                }
                let resolves = match target {
                    Reference::Table { table: target, .. } => {
                        keys.get(target).is_none_or(|k| k.contains(&value))
                    }
                    Reference::Service => ["calendar", "calendar_dates"]
                        .iter()
                        .any(|t| keys.get(t).is_some_and(|k| k.contains(&value))),
                    Reference::OneOf(targets) => {
                        let present: Vec<_> =
                            targets.iter().filter_map(|(t, _)| keys.get(t)).collect();
                        present.is_empty() || present.iter().any(|k| k.contains(&value))
                    }
                };
                assert!(
                    resolves,
                    "{}.{} = {value} references a missing {target}",
                    table.name, field.name
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fixture tables
// ---------------------------------------------------------------------------

pub fn agency(agency_id: &str, name: &str) -> String {
    format!(
        "agency_id,agency_name,agency_url,agency_timezone\n\
         {agency_id},{name},https://{}.example,America/Los_Angeles\n",
        name.to_lowercase().replace(' ', "")
    )
}

/// `calendar.txt` with weekday service for each `(service_id, start, end)`.
pub fn calendar(services: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n",
    );
    for (service_id, start, end) in services {
        body.push_str(&format!("{service_id},1,1,1,1,1,0,0,{start},{end}\n"));
    }
    body
}

/// `calendar_dates.txt` rows of `(service_id, date, exception_type)`.
pub fn calendar_dates(rows: &[(&str, &str, &str)]) -> String {
    let mut body = String::from("service_id,date,exception_type\n");
    for (service_id, date, kind) in rows {
        body.push_str(&format!("{service_id},{date},{kind}\n"));
    }
    body
}

/// `routes.txt` with bus routes of `(route_id, short_name)`.
pub fn routes(agency_id: &str, routes: &[(&str, &str)]) -> String {
    let mut body = String::from("route_id,agency_id,route_short_name,route_type\n");
    for (route_id, short_name) in routes {
        body.push_str(&format!("{route_id},{agency_id},{short_name},3\n"));
    }
    body
}

/// `stops.txt` of `(stop_id, name)` without stop codes.
pub fn stops(stops: &[(&str, &str)]) -> String {
    let mut body = String::from("stop_id,stop_name,stop_lat,stop_lon\n");
    for (stop_id, name) in stops {
        body.push_str(&format!("{stop_id},{name},37.77,-122.41\n"));
    }
    body
}

/// `trips.txt` of `(trip_id, route_id, service_id)`.
pub fn trips(trips: &[(&str, &str, &str)]) -> String {
    let mut body = String::from("route_id,service_id,trip_id\n");
    for (trip_id, route_id, service_id) in trips {
        body.push_str(&format!("{route_id},{service_id},{trip_id}\n"));
    }
    body
}

/// `stop_times.txt` visiting `stops` in order for each `(trip_id, stops)`.
pub fn stop_times(trips: &[(&str, &[&str])]) -> String {
    let mut body =
        String::from("trip_id,arrival_time,departure_time,stop_id,stop_sequence\n");
    for (trip_id, stops) in trips {
        for (n, stop_id) in stops.iter().enumerate() {
            let time = format!("08:{:02}:00", n * 5);
            body.push_str(&format!("{trip_id},{time},{time},{stop_id},{}\n", n + 1));
        }
    }
    body
}
