//! Streaming CSV readers for the reconciliation inputs
//!
//! Both readers follow the same pattern: open the file up front (fatal
//! errors surface from `new()`), then yield one `Result` per row so a
//! malformed row is reported with its line number without stopping the
//! stream.

use crate::core::webhook::GatewayCallback;
use crate::io::csv_format::{
    convert_callback_record, convert_pending_record, CallbackCsvRecord, PendingCsvRecord,
    PendingDeposit,
};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

fn open_reader(path: &Path) -> Result<csv::Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file))
}

/// Streaming reader over a pending deposit dump
#[derive(Debug)]
pub struct PendingReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl PendingReader {
    /// Open a pending deposit CSV for iteration
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(Self {
            reader: open_reader(path)?,
            line_num: 0,
        })
    }
}

impl Iterator for PendingReader {
    type Item = Result<PendingDeposit, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<PendingCsvRecord>();

        match deserializer.next()? {
            Ok(record) => {
                self.line_num += 1;
                Some(
                    convert_pending_record(record)
                        .map_err(|e| format!("Line {}: {}", self.line_num + 1, e)),
                )
            }
            Err(e) => {
                self.line_num += 1;
                Some(Err(format!(
                    "Line {}: CSV parse error: {}",
                    self.line_num + 1,
                    e
                )))
            }
        }
    }
}

/// Streaming reader over a gateway settlement callback export
#[derive(Debug)]
pub struct CallbackReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl CallbackReader {
    /// Open a callback CSV for iteration
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(Self {
            reader: open_reader(path)?,
            line_num: 0,
        })
    }
}

impl Iterator for CallbackReader {
    type Item = Result<GatewayCallback, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CallbackCsvRecord>();

        match deserializer.next()? {
            Ok(record) => {
                self.line_num += 1;
                Some(
                    convert_callback_record(record)
                        .map_err(|e| format!("Line {}: {}", self.line_num + 1, e)),
                )
            }
            Err(e) => {
                self.line_num += 1;
                Some(Err(format!(
                    "Line {}: CSV parse error: {}",
                    self.line_num + 1,
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_pending_reader_iterates_valid_rows() {
        let file = create_temp_csv("user,order_code,amount\n7,171234,50000\n8,171235,1000\n");

        let reader = PendingReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.filter_map(Result::ok).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user, 7);
        assert_eq!(records[0].order_code, "171234");
        assert_eq!(records[1].amount, Decimal::new(1_000, 0));
    }

    #[test]
    fn test_pending_reader_fails_on_missing_file() {
        let result = PendingReader::new(Path::new("nonexistent.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_pending_reader_reports_line_numbers_and_continues() {
        let file =
            create_temp_csv("user,order_code,amount\n7,171234,50000\n8,171235,oops\n9,171236,7\n");

        let reader = PendingReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.collect();

        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(records[1].is_err());
        assert!(records[1].as_ref().unwrap_err().contains("Line 3"));
        assert!(records[2].is_ok());
    }

    #[test]
    fn test_callback_reader_parses_success_and_failure_rows() {
        let file = create_temp_csv("order_code,amount,status\n171234,50000,00\n171235,,07\n");

        let reader = CallbackReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.filter_map(Result::ok).collect();

        assert_eq!(records.len(), 2);
        assert!(records[0].is_success());
        assert_eq!(records[0].amount_paid, Decimal::new(50_000, 0));
        assert!(!records[1].is_success());
    }

    #[test]
    fn test_callback_reader_handles_whitespace() {
        let file = create_temp_csv("order_code,amount,status\n  171234 , 50000 , 00 \n");

        let reader = CallbackReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.filter_map(Result::ok).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_code, "171234");
    }

    #[test]
    fn test_callback_reader_empty_file_after_header() {
        let file = create_temp_csv("order_code,amount,status\n");

        let reader = CallbackReader::new(file.path()).unwrap();
        assert_eq!(reader.count(), 0);
    }
}
