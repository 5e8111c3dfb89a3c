//! Maps loose client input onto the fixed feature row a model was trained on.
//!
//! The pipeline is pure and never fails on missing data:
//! canonical and alias resolution, categorical coding and numeric coercion,
//! heuristic derivation of absent columns, then default substitution.

mod inputs;
pub mod schema;

pub use inputs::{IrrigationInput, YieldInput};
pub use schema::{Categorical, Derivation, FeatureSchema, IRRIGATION, YIELD};

use crate::{Error, Result};
use serde_json::{Map, Value};

/// One normalized input row, columns in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    columns: &'static [&'static str],
    values: Vec<f64>,
    derived: Vec<&'static str>,
    defaulted: Vec<&'static str>,
}

impl FeatureRow {
    pub fn from_values(columns: &'static [&'static str], values: Vec<f64>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(Error::invalid_input(format!(
                "feature row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            values,
            derived: Vec::new(),
            defaulted: Vec::new(),
        })
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| self.values[i])
    }

    /// Columns estimated from other columns.
    pub fn derived(&self) -> &[&'static str] {
        &self.derived
    }

    /// Columns that fell through to the schema default.
    pub fn defaulted(&self) -> &[&'static str] {
        &self.defaulted
    }
}

pub fn normalize(raw: &Map<String, Value>, schema: &FeatureSchema) -> FeatureRow {
    let resolved = resolve_names(raw, schema);

    let mut slots: Vec<Option<f64>> = schema
        .columns
        .iter()
        .zip(resolved)
        .map(|(column, value)| {
            value.and_then(|v| match schema.categorical(column) {
                Some(categorical) => coerce_categorical(v, categorical),
                None => coerce_number(v),
            })
        })
        .collect();

    let mut derived = Vec::new();
    for derivation in schema.derivations {
        let Some(target) = column_index(schema, derivation.target) else {
            continue;
        };
        if slots[target].is_some() {
            continue;
        }
        let inputs: Option<Vec<f64>> = derivation
            .inputs
            .iter()
            .map(|name| column_index(schema, name).and_then(|i| slots[i]))
            .collect();
        if let Some(inputs) = inputs {
            let value = (derivation.formula)(&inputs);
            if value.is_finite() {
                slots[target] = Some(value);
                derived.push(derivation.target);
            }
        }
    }

    let mut defaulted = Vec::new();
    let values = schema
        .columns
        .iter()
        .zip(slots)
        .map(|(column, slot)| {
            slot.unwrap_or_else(|| {
                defaulted.push(*column);
                schema.default_value
            })
        })
        .collect();

    FeatureRow {
        columns: schema.columns,
        values,
        derived,
        defaulted,
    }
}

/// Picks the raw value for each column: exact name, then case-insensitive
/// name, then aliases in declared order. Nulls count as absent and a column
/// already filled is never overwritten.
fn resolve_names<'a>(raw: &'a Map<String, Value>, schema: &FeatureSchema) -> Vec<Option<&'a Value>> {
    let mut resolved: Vec<Option<&Value>> = schema
        .columns
        .iter()
        .map(|column| raw.get(*column).filter(|v| !v.is_null()))
        .collect();

    for (i, column) in schema.columns.iter().enumerate() {
        if resolved[i].is_none() {
            resolved[i] = find_lowercase(raw, &column.to_lowercase());
        }
    }

    for (alias, canonical) in schema.aliases {
        if let Some(i) = column_index(schema, canonical) {
            if resolved[i].is_none() {
                resolved[i] = find_lowercase(raw, alias);
            }
        }
    }

    resolved
}

fn find_lowercase<'a>(raw: &'a Map<String, Value>, needle: &str) -> Option<&'a Value> {
    raw.iter()
        .filter(|(_, v)| !v.is_null())
        .find(|(k, _)| k.to_lowercase() == needle)
        .map(|(_, v)| v)
}

fn column_index(schema: &FeatureSchema, name: &str) -> Option<usize> {
    schema.columns.iter().position(|c| *c == name)
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Known names map to their code; unknown names become missing and fall
/// through to the default.
fn coerce_categorical(value: &Value, categorical: &Categorical) -> Option<f64> {
    match value {
        Value::String(s) => categorical
            .code(s)
            .or_else(|| s.trim().parse::<f64>().ok().filter(|v| v.is_finite())),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
