//! # Variables and Expressions
//!
//! The filler never looks at row data itself. It asks a [`Calculator`] to
//! load rows, keep variables, spot group changes and evaluate expressions,
//! telling it which snapshot of the values to read through [`Evaluation`].
//!
//! [`RecordCalculator`] is the built-in implementation over JSON rows.

mod record;

pub use record::RecordCalculator;

use serde_json::Value;

use crate::data::Row;
use crate::error::QuireError;
use crate::model::Expression;

/// Which snapshot of field and variable values an expression reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Evaluation {
    /// Values after the current row was calculated.
    #[default]
    Default,
    /// Values as they stood at the end of the previous row. Footers closing
    /// a group that just changed print with these.
    Old,
    /// Values as they would be once the current row is calculated, before it is.
    Estimated,
}

/// Scope whose variables are (re)initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    Report,
    Page,
    Column,
    /// Every group whose value changed on the current row.
    Group,
}

/// The variable/expression evaluator collaborator.
pub trait Calculator {
    /// Make `row` the current row; the previous current row becomes "old".
    fn load_row(&mut self, row: Row);

    fn initialize_variables(&mut self, scope: ResetScope) -> Result<(), QuireError>;

    /// Fold the current row into every variable.
    fn calculate_variables(&mut self) -> Result<(), QuireError>;

    /// Compute what variables will hold after the current row, without committing.
    fn estimate_variables(&mut self) -> Result<(), QuireError>;

    /// For each group, outermost first: did its key change on the current row?
    fn estimate_group_ruptures(&mut self) -> Result<Vec<bool>, QuireError>;

    fn page_number(&self) -> u32;
    fn set_page_number(&mut self, number: u32);
    fn set_column_number(&mut self, number: u32);

    fn evaluate(&self, expression: &Expression, evaluation: Evaluation)
        -> Result<Value, QuireError>;
}

/// Render a value the way a text element shows it.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            match n.as_f64() {
                // Whole floats print without the trailing ".0"
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// Truthiness used for print-when conditions.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}
