use std::fmt;

use serde::{Serialize, Serializer};

use crate::row::{Row, Value};

/// One hashable component of a [`PartitionKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Null,
    Int(i64),
    /// IEEE-754 bits; `0.0` and `-0.0` normalise to the same part.
    Float(u64),
    Str(String),
    Bool(bool),
    Timestamp(i64),
}

impl From<Option<&Value>> for KeyPart {
    fn from(value: Option<&Value>) -> Self {
        match value {
            None => KeyPart::Null,
            Some(Value::Int(v)) => KeyPart::Int(*v),
            Some(Value::Float(v)) => {
                let v = if *v == 0.0 { 0.0 } else { *v };
                KeyPart::Float(v.to_bits())
            }
            Some(Value::Str(s)) => KeyPart::Str(s.clone()),
            Some(Value::Bool(b)) => KeyPart::Bool(*b),
            Some(Value::Timestamp(ms)) => KeyPart::Timestamp(*ms),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => f.write_str("null"),
            KeyPart::Int(v) => write!(f, "{v}"),
            KeyPart::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyPart::Str(s) => f.write_str(s),
            KeyPart::Bool(b) => write!(f, "{b}"),
            KeyPart::Timestamp(ms) => write!(f, "@{ms}"),
        }
    }
}

/// Identity of a virtual processor. The empty key is the single global
/// partition used when no partition columns apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Vec<KeyPart>);

impl PartitionKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn global() -> Self {
        Self(Vec::new())
    }

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        Self(vec![KeyPart::Str(s.to_string())])
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<global>");
        }
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl Serialize for PartitionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Extracts a [`PartitionKey`] from the configured column positions of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySelector {
    columns: Vec<usize>,
}

impl KeySelector {
    pub fn new(columns: Vec<usize>) -> Self {
        Self { columns }
    }

    /// Selector that maps every row to the global key.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn select(&self, row: &Row) -> PartitionKey {
        PartitionKey(
            self.columns
                .iter()
                .map(|idx| KeyPart::from(row.get(*idx)))
                .collect(),
        )
    }
}
