//! CSV Data Loader Module
//! Turns raw delimited text into schema-bound records with per-row diagnostics.

use super::diagnostics::{Diagnostic, DiagnosticCode};
use super::record::{RawRecord, Schema, SchemaError};
use csv::{ReaderBuilder, StringRecord};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Structural failures. Any of these aborts the pipeline for the dataset.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed input: unterminated quoted field opened on line {line}")]
    UnterminatedQuote { line: u64 },
    #[error("malformed input: no header row found")]
    EmptyInput,
    #[error("malformed input: duplicate column `{0}` in header")]
    DuplicateColumn(String),
    #[error("malformed input: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read CSV: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Error code reported to the dashboard.
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Io(_) => "read-failed",
            _ => "malformed-input",
        }
    }
}

/// Output of a successful parse.
#[derive(Debug, Clone)]
pub struct ParsedRecords {
    pub schema: Arc<Schema>,
    pub records: Vec<RawRecord>,
    /// `row-field-count-mismatch` entries only; those rows are still in `records`.
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses comma-separated text with standard quoting.
#[derive(Debug, Clone, Copy)]
pub struct DataLoader {
    has_header: bool,
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Comma-delimited input with a header row.
    pub fn new() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
        }
    }

    /// Whether the first row names the columns.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Field delimiter byte, `,` by default.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read and parse a CSV file.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<ParsedRecords, ParseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = text.len(), "read csv");
        self.parse(&text)
    }

    /// Parse `text` into records.
    ///
    /// Rows whose width differs from the header are kept: missing trailing
    /// fields become empty strings, extra fields are dropped, and a
    /// `row-field-count-mismatch` diagnostic is recorded.
    ///
    /// Blank lines are skipped and do not count as rows. Each record keeps
    /// the source line it started on so diagnostics stay traceable.
    pub fn parse(&self, text: &str) -> Result<ParsedRecords, ParseError> {
        // The csv reader silently closes a dangling quote at EOF
        if let Some(line) = find_unterminated_quote(text, self.delimiter) {
            return Err(ParseError::UnterminatedQuote { line });
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());
        let mut rows = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?
            .into_iter();

        let schema = if self.has_header {
            let header = rows.next().ok_or(ParseError::EmptyInput)?;
            let names = header
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let name = if i == 0 {
                        name.trim_start_matches('\u{feff}')
                    } else {
                        name
                    };
                    name.trim().to_string()
                })
                .collect();
            Schema::new(names)
                .map_err(|SchemaError::DuplicateColumn(c)| ParseError::DuplicateColumn(c))?
        } else {
            Schema::positional(rows.as_slice().first().map_or(0, StringRecord::len))
        };
        let schema = Arc::new(schema);

        let mut records = Vec::with_capacity(rows.len());
        let mut diagnostics = Vec::new();

        for (row, fields) in rows.enumerate() {
            let line = fields.position().map(|p| start_line(text, p));
            if fields.len() != schema.len() {
                let detail = format!("expected {} fields, found {}", schema.len(), fields.len());
                debug!(row, ?line, %detail, "field count mismatch");
                diagnostics.push(
                    Diagnostic::new(row, DiagnosticCode::RowFieldCountMismatch, detail).at_line(line),
                );
            }
            let values = fields.iter().map(str::to_string).collect();
            let record = RawRecord::new(schema.clone(), values);
            records.push(match line {
                Some(line) => record.with_line(line),
                None => record,
            });
        }

        info!(
            columns = schema.len(),
            rows = records.len(),
            mismatched = diagnostics.len(),
            "parsed csv"
        );

        Ok(ParsedRecords {
            schema,
            records,
            diagnostics,
        })
    }
}

/// Parse `text` with the default comma delimiter.
pub fn parse(text: &str, has_header: bool) -> Result<ParsedRecords, ParseError> {
    DataLoader::new().with_header(has_header).parse(text)
}

/// Line (1-based) the record at `position` starts on.
///
/// The reader stamps a record before stepping over the blank lines in
/// front of it, so those are counted here.
fn start_line(text: &str, position: &csv::Position) -> u64 {
    let rest = usize::try_from(position.byte())
        .ok()
        .and_then(|offset| text.as_bytes().get(offset..))
        .unwrap_or_default();
    let blank = rest
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count() as u64;
    position.line() + blank
}

/// Line (1-based) of a quoted field that is never closed, if any.
///
/// A quote only opens a field when it is the first character of the field;
/// inside a quoted field `""` is an escaped quote.
fn find_unterminated_quote(text: &str, delimiter: u8) -> Option<u64> {
    let delimiter = char::from(delimiter);
    let mut line = 1u64;
    let mut opened_on = 0u64;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match c {
            '"' if field_start => {
                in_quotes = true;
                opened_on = line;
                field_start = false;
            }
            '\n' | '\r' => field_start = true,
            c if c == delimiter => field_start = true,
            _ => field_start = false,
        }
    }

    in_quotes.then_some(opened_on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_header() {
        let parsed = parse("Date,POONDI\n01-01-2020,50\n02-01-2020,60\n", true).unwrap();
        assert_eq!(parsed.schema.columns(), &["Date", "POONDI"]);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].get("POONDI"), Some("60"));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_quoted_fields_keep_delimiters_and_newlines() {
        let text = "Station,Range\n\"Adyar, North\",\"2 - 5\"\n\"Two\nLines\",\"1 - 3\"\n";
        let parsed = parse(text, true).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].get("Station"), Some("Adyar, North"));
        assert_eq!(parsed.records[1].get("Station"), Some("Two\nLines"));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_escaped_quotes() {
        let parsed = parse("name,v\n\"say \"\"hi\"\"\",1\n", true).unwrap();
        assert_eq!(parsed.records[0].get("name"), Some("say \"hi\""));
    }

    #[test]
    fn test_field_count_mismatch_is_lenient() {
        let parsed = parse("a,b,c\n1,2\n1,2,3,4\n1,2,3\n", true).unwrap();
        assert_eq!(parsed.records.len(), 3);
        assert_eq!(parsed.records[0].get("c"), Some(""));
        assert_eq!(parsed.records[1].get("c"), Some("3"));

        let rows: Vec<usize> = parsed.diagnostics.iter().map(|d| d.row).collect();
        assert_eq!(rows, vec![0, 1]);
        assert!(parsed
            .diagnostics
            .iter()
            .all(|d| d.code == DiagnosticCode::RowFieldCountMismatch));
    }

    #[test]
    fn test_unterminated_quote_is_fatal() {
        let err = parse("a,b\n1,2\n3,\"open\n4,5\n", true).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedQuote { line: 3 }));
        assert_eq!(err.code(), "malformed-input");
    }

    #[test]
    fn test_mid_field_quote_is_literal() {
        let parsed = parse("a,b\n5\" pipe,2\n", true).unwrap();
        assert_eq!(parsed.records[0].get("a"), Some("5\" pipe"));
    }

    #[test]
    fn test_empty_input_requires_header() {
        assert!(matches!(parse("", true), Err(ParseError::EmptyInput)));
        assert!(matches!(parse("\n\n", true), Err(ParseError::EmptyInput)));

        let parsed = parse("", false).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_header_only() {
        let parsed = parse("Date,POONDI\n", true).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.schema.len(), 2);
    }

    #[test]
    fn test_without_header_uses_positions() {
        let parsed = parse("x,1\ny,2,extra\n", false).unwrap();
        assert_eq!(parsed.schema.columns(), &["0", "1"]);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].get("0"), Some("x"));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].row, 1);
    }

    #[test]
    fn test_blank_lines_skipped_but_lines_kept() {
        let parsed = parse("a,b\n1,2\n\n3,4\n", true).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.records[0].line(), Some(2));
        assert_eq!(parsed.records[1].line(), Some(4));
        assert_eq!(parsed.records[1].get("a"), Some("3"));
    }

    #[test]
    fn test_mismatch_diagnostic_carries_line() {
        let parsed = parse("a,b\n1,2\n\n\n3\n", true).unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].row, 1);
        assert_eq!(parsed.diagnostics[0].line, Some(5));
    }

    #[test]
    fn test_duplicate_header() {
        let err = parse("a,b,a\n1,2,3\n", true).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateColumn(ref c) if c == "a"));
    }

    #[test]
    fn test_header_names_trimmed() {
        let parsed = parse("\u{feff} Date , POONDI\n01-01-2020,1\n", true).unwrap();
        assert_eq!(parsed.schema.columns(), &["Date", "POONDI"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let parsed = DataLoader::new()
            .with_delimiter(b';')
            .parse("a;b\n1,5;2\n")
            .unwrap();
        assert_eq!(parsed.records[0].get("a"), Some("1,5"));
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "year,population\n2011,4646732\n").unwrap();

        let parsed = DataLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(parsed.records[0].get("population"), Some("4646732"));

        let missing = DataLoader::new().load_csv(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ParseError::Io(_))));
    }
}
