//! Structured error types for the Quire report filler.
//!
//! Ordinary band overflow is never an error: it is handled inside the fill
//! by breaking and continuing. What surfaces here is input that cannot be
//! parsed, definitions that cannot be laid out, and the fatal loop guards.

use std::fmt;

use thiserror::Error;

/// The unified error type returned by all public Quire API functions.
#[derive(Debug, Error)]
pub enum QuireError {
    /// JSON input failed to parse as a report definition or row set.
    #[error("Failed to parse input: {source}{}", hint_suffix(.hint))]
    ParseError {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The report definition cannot be filled with its page geometry.
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    /// A page or column header did not fit after the bounded number of
    /// fresh pages/columns. The header is taller than any column.
    #[error("{header} header overflow: not placed after {attempts} attempts")]
    HeaderOverflow { header: HeaderKind, attempts: usize },

    /// A flowing band needs more room than a freshly opened column offers.
    #[error("Band `{band}` needs {break_height}pt but a fresh column only has {available}pt")]
    ColumnOverflow {
        band: String,
        break_height: f64,
        available: f64,
    },

    /// A page break was requested while another page break was in progress.
    /// Symptom of a header/footer pair that can never share a page.
    #[error("Infinite loop creating new page")]
    InfiniteLoopCreatingPage,

    /// `fill_report` was called while the same filler was already filling.
    #[error("A fill is already in progress on this filler")]
    FillInProgress,

    /// The fill was cancelled through its cancellation token.
    #[error("Fill cancelled")]
    Cancelled,

    /// The data source failed to produce the next row.
    #[error("Data source error: {0}")]
    DataSource(String),
}

/// Which fixed header failed to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Page,
    Column,
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKind::Page => write!(f, "Page"),
            HeaderKind::Column => write!(f, "Column"),
        }
    }
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for QuireError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the report schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        QuireError::ParseError { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_syntax_hint() {
        let err: QuireError = serde_json::from_str::<serde_json::Value>("{ \"a\": 1, }")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse input"));
        assert!(msg.contains("trailing commas"));
    }

    #[test]
    fn header_overflow_names_the_header() {
        let err = QuireError::HeaderOverflow {
            header: HeaderKind::Column,
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Column header overflow: not placed after 3 attempts"
        );
    }
}
