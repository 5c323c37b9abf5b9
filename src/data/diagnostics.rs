//! Row-level diagnostics collected while parsing and aggregating.

use serde::Serialize;
use std::fmt;

/// Reason a row was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    RowFieldCountMismatch,
    MissingField,
    BadDateFormat,
    BadNumericValue,
    BadRangeFormat,
}

impl DiagnosticCode {
    /// Stable kebab-case name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::RowFieldCountMismatch => "row-field-count-mismatch",
            DiagnosticCode::MissingField => "missing-field",
            DiagnosticCode::BadDateFormat => "bad-date-format",
            DiagnosticCode::BadNumericValue => "bad-numeric-value",
            DiagnosticCode::BadRangeFormat => "bad-range-format",
        }
    }

    /// Whether the flagged row was left out of the aggregate.
    ///
    /// Field-count mismatches are repaired by the parser and the row is kept.
    pub fn excludes_row(&self) -> bool {
        !matches!(self, DiagnosticCode::RowFieldCountMismatch)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal, row-scoped problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    /// 1-based line in the source text where the row starts. Blank lines
    /// are not records, so this can run ahead of `row`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub code: DiagnosticCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub detail: String,
}

impl Diagnostic {
    /// Diagnostic for data row `row`, with no column or source line attached.
    pub fn new(row: usize, code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            row,
            line: None,
            code,
            column: None,
            detail: detail.into(),
        }
    }

    /// Name the offending column.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attach the source line, when known.
    pub fn at_line(mut self, line: Option<u64>) -> Self {
        self.line = line;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "row {}: {} ({}): {}", self.row, self.code, column, self.detail),
            None => write!(f, "row {}: {}: {}", self.row, self.code, self.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_kebab_case() {
        let json = serde_json::to_string(&DiagnosticCode::BadRangeFormat).unwrap();
        assert_eq!(json, "\"bad-range-format\"");
        assert_eq!(DiagnosticCode::RowFieldCountMismatch.as_str(), "row-field-count-mismatch");
    }

    #[test]
    fn test_only_mismatch_keeps_row() {
        assert!(!DiagnosticCode::RowFieldCountMismatch.excludes_row());
        assert!(DiagnosticCode::MissingField.excludes_row());
        assert!(DiagnosticCode::BadDateFormat.excludes_row());
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::new(3, DiagnosticCode::BadNumericValue, "`abc` is not a number")
            .with_column("POONDI");
        assert_eq!(d.to_string(), "row 3: bad-numeric-value (POONDI): `abc` is not a number");
    }

    #[test]
    fn test_line_serialized_only_when_known() {
        let d = Diagnostic::new(0, DiagnosticCode::MissingField, "field is empty");
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("line").is_none());

        let json = serde_json::to_value(d.at_line(Some(4))).unwrap();
        assert_eq!(json["line"], 4);
    }
}
