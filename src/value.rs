use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;

use crate::error::Result;

/// A single decoded cell.
///
/// Integer cells carry the column's signedness (`Int` vs `UInt`), FLOAT
/// and DOUBLE columns keep their wire width, and TIME columns decode to
/// a signed [`TimeDelta`] duration rather than a clock time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
    Duration(TimeDelta),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Input handed to a user-supplied column converter: decoded text, or
/// the raw bytes when the column encoding is binary.
#[derive(Debug, Clone, Copy)]
pub enum CellInput<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Caller-supplied decode function for one column.
///
/// When installed, it replaces the built-in per-type path for every
/// non-NULL cell of that column. A converter error aborts the batch.
pub type Converter = Arc<dyn Fn(CellInput<'_>) -> Result<Value> + Send + Sync>;

/// Sequence of values with an attached field-name table, shared across
/// all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub fields: Arc<[Arc<str>]>,
    pub values: Vec<Value>,
}

impl LabeledRow {
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.fields.iter().position(|f| f.as_ref() == name)?;
        self.values.get(idx)
    }
}

/// One materialised row, in whichever of the four configured shapes the
/// result set was set up with.
///
/// The decoder branches on the shape only at row-construction
/// boundaries; the per-cell path is shape-independent.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Tuple(Vec<Value>),
    /// Insertion-ordered name → value pairs.
    Dict(Vec<(Arc<str>, Value)>),
    /// Struct-sequence shape: positional access plus field names.
    Struct(LabeledRow),
    /// Named-tuple shape.
    Named(LabeledRow),
}

impl Row {
    /// The cell values, in column order, regardless of shape.
    pub fn values(&self) -> &[Value] {
        match self {
            Row::Tuple(values) => values,
            // Dict rows keep values inside the pairs; use `get`.
            Row::Dict(_) => &[],
            Row::Struct(row) | Row::Named(row) => &row.values,
        }
    }

    /// Look a cell up by column name. `None` for tuple rows and for
    /// unknown names.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Tuple(_) => None,
            Row::Dict(pairs) => pairs.iter().find(|(n, _)| n.as_ref() == name).map(|(_, v)| v),
            Row::Struct(row) | Row::Named(row) => row.get(name),
        }
    }

    /// Number of cells in the row.
    pub fn len(&self) -> usize {
        match self {
            Row::Tuple(values) => values.len(),
            Row::Dict(pairs) => pairs.len(),
            Row::Struct(row) | Row::Named(row) => row.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_row_lookup_by_name() {
        let fields: Arc<[Arc<str>]> = vec![Arc::from("id"), Arc::from("name")].into();
        let row = LabeledRow {
            fields,
            values: vec![Value::Int(1), Value::Str("ok".to_string())],
        };
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::Str("ok".to_string())));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn dict_row_lookup_preserves_order() {
        let row = Row::Dict(vec![
            (Arc::from("b"), Value::Int(2)),
            (Arc::from("a"), Value::Int(1)),
        ]);
        assert_eq!(row.get("a"), Some(&Value::Int(1)));
        assert_eq!(row.len(), 2);
    }
}
