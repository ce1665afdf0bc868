//! GeneMapper allele-table parsing.
//!
//! The export is tab-delimited with one header line and columns
//! `sample, marker, dye, allele1, allele2, height1, height2[, area1, area2]`.
//! Header names are ignored; columns are read by position.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::{debug, warn};

use lims_model::LocusReading;

use crate::error::{IngestError, Result};

/// Rows with fewer columns than this are skipped.
pub const MIN_COLUMNS: usize = 7;

/// A data row that could not be turned into a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MalformedRow {
    /// 1-based line number in the input, header included.
    pub line: u64,
    pub columns: usize,
    pub reason: String,
}

/// Readings parsed from a table plus the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub readings: Vec<LocusReading>,
    pub skipped: Vec<MalformedRow>,
}

impl ParseOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Parse a GeneMapper export.
///
/// Short or unreadable rows are skipped and reported in the outcome. Only
/// input without a header line is an error.
pub fn parse(raw: &str) -> Result<ParseOutcome> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if text.trim().is_empty() {
        return Err(IngestError::EmptyInput);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut outcome = ParseOutcome::default();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|source| IngestError::Table { source })?;
        // Header is line 1; fall back to the record index for blank-line gaps.
        let line = record
            .position()
            .map_or(index as u64 + 2, csv::Position::line);
        match reading_from_record(&record) {
            Ok(reading) => outcome.readings.push(reading),
            Err(reason) => {
                warn!(line, columns = record.len(), %reason, "skipping allele row");
                outcome.skipped.push(MalformedRow {
                    line,
                    columns: record.len(),
                    reason,
                });
            }
        }
    }

    debug!(
        readings = outcome.readings.len(),
        skipped = outcome.skipped.len(),
        "parsed allele table"
    );
    Ok(outcome)
}

fn reading_from_record(record: &StringRecord) -> std::result::Result<LocusReading, String> {
    if record.len() < MIN_COLUMNS {
        return Err(format!(
            "expected at least {MIN_COLUMNS} columns, found {}",
            record.len()
        ));
    }
    let sample_id = required(record, 0, "sample")?;
    let marker = required(record, 1, "marker")?;
    Ok(LocusReading {
        sample_id,
        marker,
        dye: text(record, 2),
        allele1: text(record, 3),
        allele2: text(record, 4),
        height1: number(record, 5, "height1")?,
        height2: number(record, 6, "height2")?,
        area1: number(record, 7, "area1")?,
        area2: number(record, 8, "area2")?,
    })
}

fn required(record: &StringRecord, index: usize, name: &str) -> std::result::Result<String, String> {
    text(record, index).ok_or_else(|| format!("{name} is blank"))
}

fn text(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn number(
    record: &StringRecord,
    index: usize,
    name: &str,
) -> std::result::Result<Option<f64>, String> {
    match record.get(index).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{name} '{value}' is not a number")),
    }
}

/// Group readings by sample id, each list sorted by marker name.
///
/// The sort is stable, so repeated markers keep their input order.
pub fn group_by_sample(
    readings: impl IntoIterator<Item = LocusReading>,
) -> BTreeMap<String, Vec<LocusReading>> {
    let mut groups: BTreeMap<String, Vec<LocusReading>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry(reading.sample_id.clone())
            .or_default()
            .push(reading);
    }
    for list in groups.values_mut() {
        list.sort_by(|a, b| a.marker.cmp(&b.marker));
    }
    groups
}
