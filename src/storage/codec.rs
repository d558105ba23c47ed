//! CSV representation of a [`Table`].
//!
//! One convention only: comma delimiter, `.` decimal point, ISO dates and a
//! `date,opening_price` header. Header names are matched case-insensitively
//! so files written as `Date,Opening_Price` still load.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use super::StoreError;
use crate::models::{round_price, Record, Table};

pub const HEADER: [&str; 2] = ["date", "opening_price"];
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A data row that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line: u64,
    pub message: String,
}

/// Outcome of a lenient decode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub kept: usize,
    pub skipped: Vec<RowIssue>,
    pub duplicates_removed: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.duplicates_removed == 0
    }
}

pub fn encode(table: &Table) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(HEADER)?;
    for record in table.records() {
        if record.opening_price.is_sign_negative() && !record.opening_price.is_zero() {
            return Err(StoreError::Invalid(format!(
                "negative price {} on {}",
                record.opening_price, record.date
            )));
        }
        writer.write_record([
            record.date.format(DATE_FORMAT).to_string(),
            round_price(record.opening_price).to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}

/// Strict decode: any bad row fails the whole table
pub fn decode(bytes: &[u8]) -> Result<Table, StoreError> {
    let (records, issues) = read_rows(bytes)?;
    if let Some(issue) = issues.into_iter().next() {
        return Err(StoreError::Parse {
            line: issue.line,
            message: issue.message,
        });
    }

    let (table, duplicates) = Table::from_records_counting(records);
    if duplicates > 0 {
        warn!("Collapsed {} duplicate date rows, later rows kept", duplicates);
    }
    Ok(table)
}

/// Lenient decode used by repair: bad rows are skipped and reported
pub fn decode_lenient(bytes: &[u8]) -> Result<(Table, RepairReport), StoreError> {
    let (records, skipped) = read_rows(bytes)?;
    let (table, duplicates_removed) = Table::from_records_counting(records);
    let report = RepairReport {
        kept: table.len(),
        skipped,
        duplicates_removed,
    };
    Ok((table, report))
}

fn read_rows(bytes: &[u8]) -> Result<(Vec<Record>, Vec<RowIssue>), StoreError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        debug!("Empty table file");
        return Ok((Vec::new(), Vec::new()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let header_ok = headers.len() == HEADER.len()
        && headers
            .iter()
            .zip(HEADER)
            .all(|(found, expected)| found.trim_start_matches('\u{feff}').eq_ignore_ascii_case(expected));
    if !header_ok {
        return Err(StoreError::Header(headers.iter().collect::<Vec<_>>().join(",")));
    }

    let mut records = Vec::new();
    let mut issues = Vec::new();
    for result in reader.records() {
        match result {
            Ok(row) => {
                let line = row.position().map(|p| p.line()).unwrap_or(0);
                match parse_row(&row) {
                    Ok(record) => records.push(record),
                    Err(message) => issues.push(RowIssue { line, message }),
                }
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                issues.push(RowIssue {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok((records, issues))
}

fn parse_row(row: &csv::StringRecord) -> Result<Record, String> {
    if row.len() != HEADER.len() {
        return Err(format!("expected 2 fields, found {}", row.len()));
    }

    let date = NaiveDate::parse_from_str(&row[0], DATE_FORMAT)
        .map_err(|e| format!("invalid date '{}': {}", &row[0], e))?;
    let price = Decimal::from_str(&row[1])
        .map_err(|e| format!("invalid price '{}': {}", &row[1], e))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("negative price '{}'", &row[1]));
    }

    Ok(Record::new(date, price))
}
