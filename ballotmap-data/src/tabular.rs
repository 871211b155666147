//! Delimited text sources.
//!
//! [`TabularReader`] streams comma-separated rows as [`RawRecord`] values
//! keyed by normalized header names. The header is the first non-blank row;
//! every later row must have exactly as many cells. Empty lines are ignored,
//! but a row of empty cells is still a row.

use std::{collections::HashSet, fs::File, io::Read};

use ballotmap_core::{RawRecord, Srid};
use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use thiserror::Error;

pub use ballotmap_core::normalise_field_name;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Errors raised while reading delimited text.
#[derive(Debug, Error)]
pub enum TabularError {
    /// The source file could not be opened.
    #[error("failed to open {path}")]
    Open {
        /// Path of the source file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The CSV parser rejected the input.
    #[error("failed to read line {line}")]
    Read {
        /// One-based line of the failure, or zero when unknown.
        line: u64,
        /// Parser error.
        #[source]
        source: csv::Error,
    },
    /// A data row had a different number of cells than the header.
    #[error("line {line} has {found} fields, header declares {expected}")]
    FieldCount {
        /// One-based line of the row.
        line: u64,
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
    /// Two header cells normalized to the same name.
    #[error("header repeats field `{field}` after normalization")]
    DuplicateField {
        /// Normalized name that appears twice.
        field: String,
    },
}

/// Lazy reader of delimited rows.
///
/// Iteration stops after the first error, so a malformed row aborts the
/// stream rather than silently skipping data. Reopen the source to restart.
///
/// # Examples
/// ```
/// use ballotmap_core::{RawValue, Srid};
/// use ballotmap_data::tabular::TabularReader;
///
/// let text = "Station ID,Post Code\n1,AB1 2CD\n";
/// let rows: Vec<_> = TabularReader::from_reader(text.as_bytes(), Srid::WGS84)
///     .collect::<Result<_, _>>()?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get("post_code"), Some(&RawValue::from("AB1 2CD")));
/// # Ok::<(), ballotmap_data::tabular::TabularError>(())
/// ```
pub struct TabularReader<R: Read> {
    rows: StringRecordsIntoIter<R>,
    header: Option<Vec<String>>,
    srid: Srid,
    finished: bool,
}

impl TabularReader<File> {
    /// Open a file; coordinate columns are declared to use `srid`.
    pub fn open(path: &Utf8Path, srid: Srid) -> Result<Self, TabularError> {
        let file = ballotmap_fs::open_std_file(path).map_err(|source| TabularError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file, srid))
    }
}

impl<R: Read> TabularReader<R> {
    /// Read rows from any byte source.
    pub fn from_reader(reader: R, srid: Srid) -> Self {
        let rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();
        Self {
            rows,
            header: None,
            srid,
            finished: false,
        }
    }

    fn take_header(&mut self, row: &StringRecord) -> Result<(), TabularError> {
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(row.len());
        for (index, cell) in row.iter().enumerate() {
            let cell = if index == 0 {
                cell.trim_start_matches(BYTE_ORDER_MARK)
            } else {
                cell
            };
            let name = normalise_field_name(cell);
            if !seen.insert(name.clone()) {
                return Err(TabularError::DuplicateField { field: name });
            }
            names.push(name);
        }
        self.header = Some(names);
        Ok(())
    }

    fn next_row(&mut self) -> Option<Result<RawRecord, TabularError>> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(source) => {
                    let line = source.position().map_or(0, csv::Position::line);
                    return Some(Err(TabularError::Read { line, source }));
                }
            };
            let Some(header) = &self.header else {
                if is_blank(&row) {
                    continue;
                }
                if let Err(err) = self.take_header(&row) {
                    return Some(Err(err));
                }
                continue;
            };
            if row.len() != header.len() {
                return Some(Err(TabularError::FieldCount {
                    line: row.position().map_or(0, csv::Position::line),
                    expected: header.len(),
                    found: row.len(),
                }));
            }
            let mut record = RawRecord::new(self.srid);
            for (name, cell) in header.iter().zip(row.iter()) {
                record.push(name, cell);
            }
            return Some(Ok(record));
        }
    }
}

impl<R: Read> Iterator for TabularReader<R> {
    type Item = Result<RawRecord, TabularError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.next_row();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter()
        .all(|cell| cell.trim_matches(BYTE_ORDER_MARK).trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotmap_core::RawValue;
    use rstest::rstest;

    fn read_all(text: &str) -> Result<Vec<RawRecord>, TabularError> {
        TabularReader::from_reader(text.as_bytes(), Srid::BRITISH_NATIONAL_GRID).collect()
    }

    #[rstest]
    #[case("")]
    #[case("   \n\n  \t\n")]
    #[case("id,name\n")]
    fn sources_without_data_rows_yield_nothing(#[case] text: &str) {
        assert!(read_all(text).expect("read").is_empty());
    }

    #[rstest]
    fn normalizes_headers_and_keeps_column_order() {
        let rows = read_all("\u{feff}Polling Place ID,Address (Full),Post.Code\n7,\"Hall, High St\",AB1 2CD\n")
            .expect("read");
        assert_eq!(rows.len(), 1);
        let names: Vec<&str> = rows[0].fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["polling_place_id", "address_full", "postcode"]);
        assert_eq!(rows[0].get("address_full"), Some(&RawValue::from("Hall, High St")));
        assert_eq!(rows[0].source_srid(), Srid::BRITISH_NATIONAL_GRID);
    }

    #[rstest]
    fn skips_blank_rows_between_records() {
        let rows = read_all("\n\nid,name\n1,a\n\n2,b\n").expect("read");
        let ids: Vec<String> = rows.iter().map(|r| r.require("id").expect("id")).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[rstest]
    fn keeps_rows_of_empty_cells() {
        let rows = read_all("id,name,postcode\n1,a,X\n,,\n2,b,Y\n").expect("read");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].len(), 3);
        assert_eq!(rows[1].get("id"), Some(&RawValue::from("")));
    }

    #[rstest]
    #[case("id,name\n1,a,extra\n", 3)]
    #[case("id,name\n1\n", 1)]
    #[case("id,name\n   \n", 1)]
    fn rejects_rows_with_wrong_width(#[case] text: &str, #[case] found: usize) {
        let err = read_all(text).expect_err("field count");
        assert!(matches!(
            err,
            TabularError::FieldCount {
                line: 2,
                expected: 2,
                found: f,
            } if f == found
        ));
    }

    #[rstest]
    fn stops_after_the_first_error() {
        let mut reader =
            TabularReader::from_reader("id\n1,2\n3\n".as_bytes(), Srid::WGS84);
        assert!(matches!(reader.next(), Some(Err(TabularError::FieldCount { .. }))));
        assert!(reader.next().is_none());
    }

    #[rstest]
    fn rejects_duplicate_normalized_headers() {
        let err = read_all("Post Code,post_code\nA,B\n").expect_err("duplicate");
        assert!(matches!(err, TabularError::DuplicateField { field } if field == "post_code"));
    }

    #[rstest]
    fn reports_missing_files() {
        let err = TabularReader::open(Utf8Path::new("/nonexistent/stations.csv"), Srid::WGS84)
            .err()
            .expect("missing file");
        assert!(matches!(err, TabularError::Open { .. }));
    }
}
