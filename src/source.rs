//! Mailing-list reader: CSV rows in, [`RecipientRecord`]s out, in file order.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::model::RecipientRecord;

/// Columns that must be present in the header. `Address2` is optional.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "FirstName",
    "LastName",
    "Address1",
    "City",
    "State",
    "PostalCode",
];

#[derive(Deserialize)]
struct RawRow {
    #[serde(rename = "FirstName", default)]
    first_name: String,
    #[serde(rename = "LastName", default)]
    last_name: String,
    #[serde(rename = "Address1", default)]
    address1: String,
    #[serde(rename = "Address2", default)]
    address2: Option<String>,
    #[serde(rename = "City", default)]
    city: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "PostalCode", default)]
    postal_code: String,
}

impl RawRow {
    fn into_record(self, row: usize) -> Result<RecipientRecord, Error> {
        let required = [
            ("FirstName", &self.first_name),
            ("LastName", &self.last_name),
            ("Address1", &self.address1),
            ("City", &self.city),
            ("State", &self.state),
            ("PostalCode", &self.postal_code),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::RowData {
                row,
                reason: format!("missing required field(s): {}", missing.join(", ")),
            });
        }

        Ok(RecipientRecord {
            row,
            first_name: self.first_name,
            last_name: self.last_name,
            address1: self.address1,
            address2: self.address2.filter(|a| !a.trim().is_empty()),
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
        })
    }
}

/// Lazy, single-pass sequence of recipients. Re-open to read again.
pub struct RowSource<R: Read = File> {
    rows: csv::DeserializeRecordsIntoIter<R, RawRow>,
    next_row: usize,
}

impl RowSource<File> {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::Input(format!("cannot open {}: {e}", path.display())))?;
        Self::from_reader(file)
    }
}

impl<R: Read> RowSource<R> {
    /// Wrap any reader. The header is read and checked immediately.
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| Error::Input(format!("cannot read header row: {e}")))?;
        let present: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !present.contains(col))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Input(format!(
                "header is missing required column(s): {}",
                missing.join(", ")
            )));
        }
        log::debug!("CSV header: {present:?}");

        Ok(Self {
            rows: reader.into_deserialize(),
            next_row: 1,
        })
    }
}

impl<R: Read> Iterator for RowSource<R> {
    type Item = Result<RecipientRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.rows.next()?;
        let row = self.next_row;
        self.next_row += 1;
        Some(match raw {
            Ok(raw) => raw.into_record(row),
            Err(e) if e.is_io_error() => Err(Error::Csv(e)),
            Err(e) => Err(Error::RowData {
                row,
                reason: e.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "FirstName,LastName,Address1,Address2,City,State,PostalCode\n";

    fn read_all(csv: &str) -> Vec<Result<RecipientRecord, Error>> {
        RowSource::from_reader(csv.as_bytes()).unwrap().collect()
    }

    #[test]
    fn reads_rows_in_file_order() {
        let csv = format!(
            "{HEADER}jane,doe,123 Main St,,Springfield,IL,62704\n\
             john,roe,9 Elm Rd,Apt 4,Shelbyville,IL,62565\n"
        );
        let records: Vec<RecipientRecord> =
            read_all(&csv).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 1);
        assert_eq!(records[0].first_name, "jane");
        assert_eq!(records[0].address2, None);
        assert_eq!(records[1].row, 2);
        assert_eq!(records[1].address2.as_deref(), Some("Apt 4"));
    }

    #[test]
    fn address2_column_is_optional() {
        let csv = "FirstName,LastName,Address1,City,State,PostalCode\n\
                   jane,doe,123 Main St,Springfield,IL,62704\n";
        let records = read_all(csv);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().address2, None);
    }

    #[test]
    fn whitespace_only_address2_is_absent() {
        let csv = format!("{HEADER}jane,doe,123 Main St,\"   \",Springfield,IL,62704\n");
        let records = read_all(&csv);
        assert_eq!(records[0].as_ref().unwrap().address2, None);
    }

    #[test]
    fn missing_column_fails_before_any_row() {
        let csv = "FirstName,LastName,Address1,Address2,City,PostalCode\n\
                   jane,doe,123 Main St,,Springfield,62704\n";
        match RowSource::from_reader(csv.as_bytes()) {
            Err(Error::Input(msg)) => assert!(msg.contains("State"), "{msg}"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected missing column error"),
        }
    }

    #[test]
    fn blank_required_field_is_a_row_error() {
        let csv = format!(
            "{HEADER}jane,doe,,,Springfield,IL,62704\n\
             john,roe,9 Elm Rd,,Shelbyville,IL,62565\n"
        );
        let records = read_all(&csv);
        match &records[0] {
            Err(Error::RowData { row, reason }) => {
                assert_eq!(*row, 1);
                assert!(reason.contains("Address1"), "{reason}");
            }
            other => panic!("expected row error, got {other:?}"),
        }
        assert!(records[1].is_ok());
    }

    #[test]
    fn short_row_is_a_row_error() {
        let csv = format!("{HEADER}jane,doe,123 Main St\n");
        let records = read_all(&csv);
        assert!(matches!(records[0], Err(Error::RowData { row: 1, .. })));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let result = RowSource::open(Path::new("/nonexistent/recipients.csv"));
        assert!(matches!(result, Err(Error::Input(_))));
    }
}
