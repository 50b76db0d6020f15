use crate::row::{Row, Value};

/// Main-output buffer of a single invocation, in emission order.
///
/// Rows are released downstream only after the invocation succeeds and its
/// state changes are committed.
#[derive(Debug, Default)]
pub struct Collector {
    rows: Vec<Row>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a row. An explicit null row (`None`) is dropped.
    pub fn collect(&mut self, row: Option<Row>) {
        if let Some(row) = row {
            self.rows.push(row);
        }
    }

    /// Emit a scalar, wrapped into a one-field row. A null scalar is kept as
    /// a row with a single null field.
    pub fn collect_scalar(&mut self, value: Option<Value>) {
        self.rows.push(Row::single(value));
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
