//! Built-in calculator over JSON rows.
//!
//! Besides the declared variables it keeps the counters every report gets:
//! `REPORT_COUNT`, `PAGE_COUNT`, `COLUMN_COUNT` and `<group>_COUNT`, and the
//! `PAGE_NUMBER` / `COLUMN_NUMBER` slots the filler sets.

use std::collections::HashMap;

use serde_json::{Number, Value};

use super::{is_truthy, value_to_text, Calculator, Evaluation, ResetScope};
use crate::data::Row;
use crate::error::QuireError;
use crate::model::{Calculation, Expression, Report, ResetType, VariableDef};

pub const PAGE_NUMBER: &str = "PAGE_NUMBER";
pub const COLUMN_NUMBER: &str = "COLUMN_NUMBER";

#[derive(Debug, Clone)]
struct VariableSlot {
    def: VariableDef,
    value: Value,
    old: Value,
    estimated: Option<Value>,
}

impl VariableSlot {
    fn new(def: VariableDef) -> Self {
        Self {
            def,
            value: Value::Null,
            old: Value::Null,
            estimated: None,
        }
    }

    fn reset(&mut self) {
        self.value = initial_value(self.def.calculation);
        self.estimated = None;
    }
}

fn initial_value(calculation: Calculation) -> Value {
    match calculation {
        Calculation::Count | Calculation::Sum => Value::from(0),
        _ => Value::Null,
    }
}

/// Fold `input` into the running `current` value.
fn increment(calculation: Calculation, current: &Value, input: Value) -> Value {
    match calculation {
        Calculation::Nothing => input,
        Calculation::Count => {
            let n = current.as_i64().unwrap_or(0);
            if input.is_null() {
                Value::from(n)
            } else {
                Value::from(n + 1)
            }
        }
        Calculation::Sum => match (current.as_f64(), input.as_f64()) {
            (Some(a), Some(b)) => number(a + b),
            (None, Some(b)) => number(b),
            _ => current.clone(),
        },
        Calculation::Highest | Calculation::Lowest => match (current.as_f64(), input.as_f64()) {
            (Some(a), Some(b)) => {
                let keep_new = if calculation == Calculation::Highest {
                    b > a
                } else {
                    b < a
                };
                if keep_new {
                    input
                } else {
                    current.clone()
                }
            }
            (None, Some(_)) => input,
            _ => current.clone(),
        },
        Calculation::First => {
            if current.is_null() {
                input
            } else {
                current.clone()
            }
        }
    }
}

fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Traverse a JSON value by dot-path segments.
fn traverse<'a>(value: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in parts {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            Value::Array(arr) => {
                let idx: usize = part.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

fn lookup(row: &Row, path: &str) -> Value {
    let parts: Vec<&str> = path.split('.').collect();
    row.get(parts[0])
        .and_then(|root| traverse(root, &parts[1..]))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Calculator over JSON rows, driven by the report's variables and groups.
pub struct RecordCalculator {
    groups: Vec<(String, Expression)>,
    variables: Vec<VariableSlot>,
    index: HashMap<String, usize>,
    current: Option<Row>,
    previous: Option<Row>,
    changed: Vec<bool>,
    page_number: u32,
    column_number: u32,
}

impl RecordCalculator {
    pub fn new(report: &Report) -> Self {
        let counter = |name: String, reset: ResetType| VariableDef {
            name,
            expression: Expression::literal(true),
            calculation: Calculation::Count,
            reset,
        };

        let mut defs = vec![
            counter("REPORT_COUNT".to_string(), ResetType::Report),
            counter("PAGE_COUNT".to_string(), ResetType::Page),
            counter("COLUMN_COUNT".to_string(), ResetType::Column),
        ];
        defs.extend(
            report
                .groups
                .iter()
                .map(|g| counter(format!("{}_COUNT", g.name), ResetType::Group(g.name.clone()))),
        );
        defs.extend(report.variables.iter().cloned());

        let variables: Vec<VariableSlot> = defs.into_iter().map(VariableSlot::new).collect();
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.def.name.clone(), i))
            .collect();

        Self {
            groups: report
                .groups
                .iter()
                .map(|g| (g.name.clone(), g.expression.clone()))
                .collect(),
            variables,
            index,
            current: None,
            previous: None,
            changed: vec![false; report.groups.len()],
            page_number: 0,
            column_number: 0,
        }
    }

    /// Current value of a variable, for inspection.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.variables[i].value)
    }

    fn row_for(&self, evaluation: Evaluation) -> Option<&Row> {
        match evaluation {
            Evaluation::Old => self.previous.as_ref().or(self.current.as_ref()),
            Evaluation::Default | Evaluation::Estimated => self.current.as_ref(),
        }
    }

    fn read_variable(&self, name: &str, evaluation: Evaluation) -> Value {
        match name {
            PAGE_NUMBER => return Value::from(self.page_number),
            COLUMN_NUMBER => return Value::from(self.column_number),
            _ => {}
        }
        let Some(&i) = self.index.get(name) else {
            log::warn!("unknown variable `{name}`");
            return Value::Null;
        };
        let slot = &self.variables[i];
        match evaluation {
            Evaluation::Default => slot.value.clone(),
            Evaluation::Old => slot.old.clone(),
            Evaluation::Estimated => slot.estimated.clone().unwrap_or_else(|| slot.value.clone()),
        }
    }

    fn resets_on(&self, reset: &ResetType, scope: ResetScope) -> bool {
        match (scope, reset) {
            (ResetScope::Report, _) => true,
            (ResetScope::Page, ResetType::Page) => true,
            (ResetScope::Column, ResetType::Column) => true,
            (ResetScope::Group, ResetType::Group(name)) => self
                .groups
                .iter()
                .position(|(g, _)| g == name)
                .map(|i| self.changed[i])
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl Calculator for RecordCalculator {
    fn load_row(&mut self, row: Row) {
        self.previous = self.current.take();
        self.current = Some(row);
        for slot in &mut self.variables {
            slot.old = slot.value.clone();
            slot.estimated = None;
        }
    }

    fn initialize_variables(&mut self, scope: ResetScope) -> Result<(), QuireError> {
        let targets: Vec<usize> = (0..self.variables.len())
            .filter(|&i| self.resets_on(&self.variables[i].def.reset, scope))
            .collect();
        for i in targets {
            self.variables[i].reset();
        }
        Ok(())
    }

    fn calculate_variables(&mut self) -> Result<(), QuireError> {
        for i in 0..self.variables.len() {
            let input = self.evaluate(&self.variables[i].def.expression, Evaluation::Default)?;
            let slot = &mut self.variables[i];
            slot.value = increment(slot.def.calculation, &slot.value, input);
            slot.estimated = None;
        }
        Ok(())
    }

    fn estimate_variables(&mut self) -> Result<(), QuireError> {
        for i in 0..self.variables.len() {
            let input = self.evaluate(&self.variables[i].def.expression, Evaluation::Default)?;
            let slot = &mut self.variables[i];
            slot.estimated = Some(increment(slot.def.calculation, &slot.value, input));
        }
        Ok(())
    }

    fn estimate_group_ruptures(&mut self) -> Result<Vec<bool>, QuireError> {
        let mut outer_changed = false;
        let mut changed = Vec::with_capacity(self.groups.len());
        for (_, expression) in &self.groups {
            let has_changed = outer_changed
                || (self.previous.is_some()
                    && self.evaluate(expression, Evaluation::Old)?
                        != self.evaluate(expression, Evaluation::Default)?);
            outer_changed = has_changed;
            changed.push(has_changed);
        }
        self.changed = changed.clone();
        Ok(changed)
    }

    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn set_page_number(&mut self, number: u32) {
        self.page_number = number;
    }

    fn set_column_number(&mut self, number: u32) {
        self.column_number = number;
    }

    fn evaluate(
        &self,
        expression: &Expression,
        evaluation: Evaluation,
    ) -> Result<Value, QuireError> {
        Ok(match expression {
            Expression::Literal { value } => value.clone(),
            Expression::Field { name } => self
                .row_for(evaluation)
                .map(|row| lookup(row, name))
                .unwrap_or(Value::Null),
            Expression::Variable { name } => self.read_variable(name, evaluation),
            Expression::Concat { parts } => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&value_to_text(&self.evaluate(part, evaluation)?));
                }
                Value::String(text)
            }
            Expression::Equals { left, right } => {
                Value::Bool(self.evaluate(left, evaluation)? == self.evaluate(right, evaluation)?)
            }
            Expression::Not { expr } => Value::Bool(!is_truthy(&self.evaluate(expr, evaluation)?)),
        })
    }
}
