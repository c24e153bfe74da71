//! Data sources: where the rows driving a fill come from.

use serde_json::{Map, Value};

use crate::error::QuireError;

/// One data row: field name to value.
pub type Row = Map<String, Value>;

/// A blocking, forward-only row source.
pub trait DataSource {
    /// Advance to the next row, or `None` once the source is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, QuireError>;
}

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct JsonRows {
    rows: std::vec::IntoIter<Row>,
}

impl JsonRows {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Parse a JSON array of objects.
    pub fn from_json(json: &str) -> Result<Self, QuireError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, QuireError> {
        match value {
            Value::Array(items) => {
                let rows = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Object(map) => Ok(map),
                        other => Err(QuireError::DataSource(format!(
                            "row {i} is not an object: {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::new(rows))
            }
            other => Err(QuireError::DataSource(format!(
                "expected an array of rows, got {other}"
            ))),
        }
    }
}

impl DataSource for JsonRows {
    fn next_row(&mut self) -> Result<Option<Row>, QuireError> {
        Ok(self.rows.next())
    }
}
