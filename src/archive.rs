//! Reading GTFS tables out of feed archives.
//!
//! A [`FeedArchive`] holds one read handle on a zip file for the whole run.
//! Tables are loaded whole ([`TableData`]); GTFS tables are small enough that
//! this is simpler than streaming, and it lets several archives' copies of a
//! table be inspected together before any row is written.
//!
//! [`FeedToMerge`] pairs an archive with its [`FeedVersion`] and the id sets
//! ([`FeedIds`]) that reconciling merges need. The scan that fills those sets
//! runs at most once per archive.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::MergeError;
use crate::feed::{FeedVersion, parse_date};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ---------------------------------------------------------------------------
// TableData
// ---------------------------------------------------------------------------

/// One table read from an archive: trimmed headers plus raw records.
#[derive(Clone, Debug, Default)]
pub struct TableData {
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl TableData {
    #[must_use]
    pub const fn new(headers: Vec<String>, records: Vec<StringRecord>) -> Self {
        Self { headers, records }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Index of a column by header name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of `name` in `record`, or `""` when the column or cell is absent.
    #[must_use]
    pub fn value<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.column(name)
            .and_then(|idx| record.get(idx))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// FeedArchive
// ---------------------------------------------------------------------------

/// A read handle on a feed's zip archive.
pub struct FeedArchive {
    path: PathBuf,
    zip: RefCell<ZipArchive<BufReader<File>>>,
}

impl std::fmt::Debug for FeedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedArchive").field("path", &self.path).finish()
    }
}

impl FeedArchive {
    /// Open an archive for reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a zip archive.
    pub fn open(path: &Path) -> Result<Self, MergeError> {
        let file = File::open(path).map_err(|e| MergeError::io(path, e))?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(|source| MergeError::Zip {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self {
            path: path.to_owned(),
            zip: RefCell::new(zip),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of every file entry, in archive order.
    #[must_use]
    pub fn entry_names(&self) -> Vec<String> {
        self.zip
            .borrow()
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_owned)
            .collect()
    }

    /// Whether the archive has an entry for `table`.
    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        let entry = format!("{table}.txt");
        self.zip.borrow().file_names().any(|name| name == entry)
    }

    /// Read a whole table, or `None` if the archive has no entry for it.
    ///
    /// A leading UTF-8 byte-order mark is ignored and headers are trimmed.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be decompressed or is not CSV.
    pub fn read_table(&self, table: &str) -> Result<Option<TableData>, MergeError> {
        let mut bytes = Vec::new();
        {
            let mut zip = self.zip.borrow_mut();
            let mut entry = match zip.by_name(&format!("{table}.txt")) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => return Ok(None),
                Err(source) => {
                    return Err(MergeError::Zip {
                        path: self.path.clone(),
                        source,
                    });
                }
            };
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| MergeError::io(&self.path, e))?;
        }
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

        let csv_err = |source| MergeError::Csv {
            path: self.path.clone(),
            table: table.to_owned(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body);
        let headers = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_owned)
            .collect();
        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;
        Ok(Some(TableData::new(headers, records)))
    }

    /// Scan the service and trip tables for the id sets used to pick a
    /// reconciling strategy.
    ///
    /// # Errors
    /// Returns an error if a table cannot be read or holds an invalid date.
    pub fn scan_ids(&self) -> Result<FeedIds, MergeError> {
        let mut ids = FeedIds::default();

        if let Some(calendar) = self.read_table("calendar")? {
            for record in calendar.records() {
                let service_id = calendar.value(record, "service_id");
                if service_id.is_empty() {
                    continue;
                }
                let range = ServiceRange {
                    start: parse_date(
                        "calendar",
                        "start_date",
                        calendar.value(record, "start_date"),
                    )?,
                    end: parse_date("calendar", "end_date", calendar.value(record, "end_date"))?,
                };
                ids.service_ids.insert(service_id.to_owned());
                ids.calendar_ranges.insert(service_id.to_owned(), range);
                ids.earliest_calendar_start = Some(
                    ids.earliest_calendar_start
                        .map_or(range.start, |d| d.min(range.start)),
                );
                ids.widen_service_range(range.start);
                ids.widen_service_range(range.end);
            }
        }

        if let Some(dates) = self.read_table("calendar_dates")? {
            for record in dates.records() {
                let service_id = dates.value(record, "service_id");
                if service_id.is_empty() {
                    continue;
                }
                ids.service_ids.insert(service_id.to_owned());
                if dates.value(record, "exception_type") == "1" {
                    let date = parse_date("calendar_dates", "date", dates.value(record, "date"))?;
                    ids.widen_service_range(date);
                }
            }
        }

        if let Some(trips) = self.read_table("trips")? {
            for record in trips.records() {
                let trip_id = trips.value(record, "trip_id");
                if trip_id.is_empty() {
                    continue;
                }
                ids.trip_ids.insert(trip_id.to_owned());
                ids.trip_services.insert(
                    trip_id.to_owned(),
                    trips.value(record, "service_id").to_owned(),
                );
            }
        }

        Ok(ids)
    }

    /// Ordered stop visits for each trip in `trips`.
    ///
    /// # Errors
    /// Returns an error if `stop_times` cannot be read.
    pub fn stop_time_signatures(
        &self,
        trips: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Vec<StopVisit>>, MergeError> {
        let mut signatures: BTreeMap<String, Vec<StopVisit>> = BTreeMap::new();
        let Some(stop_times) = self.read_table("stop_times")? else {
            return Ok(signatures);
        };
        for record in stop_times.records() {
            let trip_id = stop_times.value(record, "trip_id");
            if !trips.contains(trip_id) {
                continue;
            }
            signatures
                .entry(trip_id.to_owned())
                .or_default()
                .push(StopVisit {
                    sequence: stop_times.value(record, "stop_sequence").to_owned(),
                    stop_id: stop_times.value(record, "stop_id").to_owned(),
                });
        }
        for visits in signatures.values_mut() {
            visits.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        }
        Ok(signatures)
    }
}

// ---------------------------------------------------------------------------
// Scanned ids
// ---------------------------------------------------------------------------

/// Inclusive range of service dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One `stop_times` row reduced to what identifies the visit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopVisit {
    pub sequence: String,
    pub stop_id: String,
}

impl StopVisit {
    fn sort_key(&self) -> (u64, &str) {
        (self.sequence.parse().unwrap_or(u64::MAX), &self.sequence)
    }
}

/// Ids collected from one archive's service and trip tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedIds {
    /// Every service id in `calendar` or `calendar_dates`.
    pub service_ids: BTreeSet<String>,
    pub trip_ids: BTreeSet<String>,
    /// Service each trip runs on.
    pub trip_services: BTreeMap<String, String>,
    /// `calendar` date range per service id.
    pub calendar_ranges: BTreeMap<String, ServiceRange>,
    /// Earliest `start_date` in `calendar`.
    pub earliest_calendar_start: Option<NaiveDate>,
    /// Span of all dates with service, from `calendar` and added
    /// `calendar_dates` exceptions.
    pub service_range: Option<ServiceRange>,
}

impl FeedIds {
    fn widen_service_range(&mut self, date: NaiveDate) {
        self.service_range = Some(match self.service_range {
            None => ServiceRange {
                start: date,
                end: date,
            },
            Some(r) => ServiceRange {
                start: r.start.min(date),
                end: r.end.max(date),
            },
        });
    }

    /// Trips of this feed that run on `service_id`.
    pub fn trips_on<'a>(&'a self, service_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.trip_services
            .iter()
            .filter(move |(_, s)| s.as_str() == service_id)
            .map(|(t, _)| t.as_str())
    }
}

// ---------------------------------------------------------------------------
// FeedToMerge
// ---------------------------------------------------------------------------

/// A feed version paired with its open archive.
#[derive(Debug)]
pub struct FeedToMerge {
    pub version: FeedVersion,
    /// The version's id scope (see [`FeedVersion::id_scope`]).
    pub scope: String,
    pub archive: FeedArchive,
    ids: Option<FeedIds>,
}

impl FeedToMerge {
    /// Open the archive behind `version`.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be opened.
    pub fn open(version: FeedVersion) -> Result<Self, MergeError> {
        let archive = FeedArchive::open(&version.archive_path)?;
        Ok(Self {
            scope: version.id_scope(),
            version,
            archive,
            ids: None,
        })
    }

    /// Scan the archive's ids, reusing an earlier scan if there was one.
    ///
    /// # Errors
    /// Returns an error if the scan fails.
    pub fn scan(&mut self) -> Result<&FeedIds, MergeError> {
        if self.ids.is_none() {
            self.ids = Some(self.archive.scan_ids()?);
        }
        Ok(self.ids.get_or_insert_with(FeedIds::default))
    }

    /// Ids from an earlier [`scan`](Self::scan).
    #[must_use]
    pub const fn ids(&self) -> Option<&FeedIds> {
        self.ids.as_ref()
    }
}
