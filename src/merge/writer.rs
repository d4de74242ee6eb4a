//! Writing merged tables into the output archive.
//!
//! Each table is buffered as CSV and added to the archive once all feeds
//! have been merged into it, so a table that ends up empty leaves no entry.
//! The archive itself is built in a temporary file beside the destination
//! and only moved into place by [`OutputArchive::persist`]. Dropping an
//! unpersisted archive deletes the temporary file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// TableWriter
// ---------------------------------------------------------------------------

/// Buffers one merged table as CSV.
pub struct TableWriter {
    destination: PathBuf,
    table: String,
    header: Vec<&'static str>,
    csv: csv::Writer<Vec<u8>>,
    rows: usize,
}

/// A finished table ready to be added to the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOutput {
    pub table: String,
    /// Data rows, not counting the header.
    pub lines: usize,
    pub bytes: Vec<u8>,
}

impl TableWriter {
    /// `destination` is used only for error messages.
    #[must_use]
    pub fn new(destination: &Path, table: &str, header: Vec<&'static str>) -> Self {
        Self {
            destination: destination.to_owned(),
            table: table.to_owned(),
            header,
            csv: csv::Writer::from_writer(Vec::new()),
            rows: 0,
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Append a row. The header is written before the first one.
    ///
    /// # Errors
    /// Returns an error if the row cannot be encoded.
    pub fn write_row(&mut self, values: &[String]) -> Result<(), MergeError> {
        if self.rows == 0 {
            self.csv
                .write_record(&self.header)
                .map_err(|e| self.csv_error(e))?;
        }
        self.csv.write_record(values).map_err(|e| self.csv_error(e))?;
        self.rows += 1;
        Ok(())
    }

    /// The buffered table, or `None` when no row was written.
    ///
    /// # Errors
    /// Returns an error if the buffer cannot be flushed.
    pub fn finish(self) -> Result<Option<TableOutput>, MergeError> {
        if self.rows == 0 {
            return Ok(None);
        }
        let bytes = self
            .csv
            .into_inner()
            .map_err(|e| MergeError::io(&self.destination, e.into_error()))?;
        Ok(Some(TableOutput {
            table: self.table,
            lines: self.rows,
            bytes,
        }))
    }

    fn csv_error(&self, source: csv::Error) -> MergeError {
        MergeError::Csv {
            path: self.destination.clone(),
            table: self.table.clone(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputArchive
// ---------------------------------------------------------------------------

/// The merged archive under construction.
pub struct OutputArchive {
    destination: PathBuf,
    zip: ZipWriter<NamedTempFile>,
}

impl OutputArchive {
    /// Start an archive that will be persisted to `destination`.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created.
    pub fn create(destination: &Path) -> Result<Self, MergeError> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(".feedmerge-")
            .suffix(".zip.tmp")
            .tempfile_in(dir)
            .map_err(|e| MergeError::io(dir, e))?;
        Ok(Self {
            destination: destination.to_owned(),
            zip: ZipWriter::new(file),
        })
    }

    /// Add a finished table as `<table>.txt`.
    ///
    /// # Errors
    /// Returns an error if the entry cannot be written.
    pub fn add_table(&mut self, output: &TableOutput) -> Result<(), MergeError> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(format!("{}.txt", output.table), options)
            .map_err(|source| MergeError::Zip {
                path: self.destination.clone(),
                source,
            })?;
        self.zip
            .write_all(&output.bytes)
            .map_err(|e| MergeError::io(&self.destination, e))
    }

    /// Finish the archive, fsync it, and move it to the destination.
    ///
    /// # Errors
    /// Returns an error if finishing, syncing, or renaming fails.
    pub fn persist(self) -> Result<(), MergeError> {
        let file = self.zip.finish().map_err(|source| MergeError::Zip {
            path: self.destination.clone(),
            source,
        })?;
        file.as_file()
            .sync_all()
            .map_err(|e| MergeError::io(file.path(), e))?;
        file.persist(&self.destination)
            .map_err(|e| MergeError::Persist {
                path: self.destination.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}
