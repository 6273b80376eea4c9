//! Query log records
//!
//! The log is tab-separated, one search per line:
//!
//! ```text
//! 2015-08-01 00:03:43	hello world
//! 2015-08-01 00:03:44	"exact phrase"
//! ```
//!
//! Query text is taken literally (no CSV quoting rules). A malformed line
//! yields an error for that line and reading carries on with the next one.

use crate::indexer::error::{IndexerError, IndexerResult};
use crate::indexer::time_range::TimeRange;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;

/// Timestamp layout used by the log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One search: when it happened and what was searched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub query: String,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, query: impl Into<String>) -> Self {
        Self {
            timestamp,
            query: query.into(),
        }
    }
}

/// Reads records from a tab-separated query log
pub struct TraceReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: Read> TraceReader<R> {
    pub fn new(input: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(input);

        Self {
            records: reader.into_records(),
        }
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = IndexerResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.records.next()?;
        Some(row.map_err(csv_error).and_then(|row| parse_row(&row)))
    }
}

fn csv_error(e: csv::Error) -> IndexerError {
    let line = e.position().map(|p| p.line()).unwrap_or(0);
    match e.into_kind() {
        csv::ErrorKind::Io(io) => IndexerError::Io(io),
        kind => IndexerError::Record {
            line,
            reason: format!("{:?}", kind),
        },
    }
}

fn parse_row(row: &csv::StringRecord) -> IndexerResult<Record> {
    let line = row.position().map(|p| p.line()).unwrap_or(0);
    let invalid = |reason: String| IndexerError::Record { line, reason };

    if row.len() != 2 {
        return Err(invalid(format!("expected 2 fields, found {}", row.len())));
    }

    let timestamp = parse_timestamp(&row[0])
        .ok_or_else(|| invalid(format!("invalid timestamp {:?}", &row[0])))?;

    Ok(Record::new(timestamp, &row[1]))
}

/// Parse a log timestamp (UTC)
///
/// Years outside [`SUPPORTED_YEARS`](crate::indexer::time_range::SUPPORTED_YEARS)
/// are rejected so every bucket keeps its fixed-width text form.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let timestamp = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    TimeRange::supports(timestamp).then_some(timestamp)
}
