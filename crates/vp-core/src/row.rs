use std::fmt;
use std::str::FromStr;

use orion_error::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use crate::error::{CoreReason, CoreResult};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single non-null field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Epoch milliseconds.
    Timestamp(i64),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Value::Int(_) => DataKind::Int,
            Value::Float(_) => DataKind::Float,
            Value::Str(_) => DataKind::Str,
            Value::Bool(_) => DataKind::Bool,
            Value::Timestamp(_) => DataKind::Timestamp,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(v) | Value::Timestamp(v) => serde_json::Value::from(*v),
            Value::Float(v) => Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
        }
    }

    fn from_json(kind: DataKind, json: &serde_json::Value) -> Option<Value> {
        match kind {
            DataKind::Int => json.as_i64().map(Value::Int),
            DataKind::Float => json.as_f64().map(Value::Float),
            DataKind::Str => json.as_str().map(|s| Value::Str(s.to_string())),
            DataKind::Bool => json.as_bool().map(Value::Bool),
            DataKind::Timestamp => match json {
                serde_json::Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| Value::Timestamp(dt.timestamp_millis())),
                other => other.as_i64().map(Value::Timestamp),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Timestamp(ms) => write!(f, "@{ms}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Column data kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Int,
    Float,
    Str,
    Bool,
    Timestamp,
}

impl FromStr for DataKind {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "bigint" | "long" => Ok(DataKind::Int),
            "float" | "double" => Ok(DataKind::Float),
            "str" | "string" | "varchar" => Ok(DataKind::Str),
            "bool" | "boolean" => Ok(DataKind::Bool),
            "timestamp" | "ts" => Ok(DataKind::Timestamp),
            other => StructError::from(CoreReason::DataFormat)
                .with_detail(format!("unknown data kind {other:?}"))
                .err(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub kind: DataKind,
    pub nullable: bool,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Ordered field declarations describing a [`Row`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSchema {
    fields: Vec<FieldDecl>,
}

impl RowSchema {
    pub fn new(fields: Vec<FieldDecl>) -> Self {
        Self { fields }
    }

    /// Parse a compact declaration such as `"region:str, amount:float"`.
    pub fn parse_decl(decl: &str) -> CoreResult<Self> {
        let mut fields = Vec::new();
        for part in decl.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((name, kind)) = part.split_once(':') else {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("field declaration {part:?} lacks ':<kind>'"))
                    .err();
            };
            let name = name.trim();
            if name.is_empty() {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("field declaration {part:?} has an empty name"))
                    .err();
            }
            fields.push(FieldDecl::new(name, kind.parse()?));
        }
        if fields.is_empty() {
            return StructError::from(CoreReason::DataFormat)
                .with_detail("schema declaration is empty")
                .err();
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The all-null row of this schema; what a never-written state entry reads as.
    pub fn empty_row(&self) -> Row {
        Row(vec![None; self.fields.len()])
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// Positional record; `None` marks a null field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row(Vec<Option<Value>>);

impl Row {
    pub fn new(fields: Vec<Option<Value>>) -> Self {
        Self(fields)
    }

    /// A one-field row wrapping a scalar (which may itself be null).
    pub fn single(value: Option<Value>) -> Self {
        Self(vec![value])
    }

    pub fn fields(&self) -> &[Option<Value>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx).and_then(Option::as_ref)
    }

    /// Set field `idx`, growing the row with nulls if needed.
    pub fn set(&mut self, idx: usize, value: Option<Value>) {
        if idx >= self.0.len() {
            self.0.resize(idx + 1, None);
        }
        self.0[idx] = value;
    }

    /// Decode a JSON object according to `schema`.
    ///
    /// Missing keys and JSON `null` become null fields; a null in a
    /// non-nullable column or a value of the wrong type is a `DataFormat` error.
    pub fn from_json(schema: &RowSchema, json: &serde_json::Value) -> CoreResult<Row> {
        let Some(obj) = json.as_object() else {
            return StructError::from(CoreReason::DataFormat)
                .with_detail(format!("expected a JSON object, got {json}"))
                .err();
        };
        let mut fields = Vec::with_capacity(schema.len());
        for decl in schema.fields() {
            let value = match obj.get(&decl.name) {
                None | Some(serde_json::Value::Null) => None,
                Some(v) => match Value::from_json(decl.kind, v) {
                    Some(val) => Some(val),
                    None => {
                        return StructError::from(CoreReason::DataFormat)
                            .with_detail(format!(
                                "field {:?}: {v} is not a valid {:?}",
                                decl.name, decl.kind
                            ))
                            .err();
                    }
                },
            };
            if value.is_none() && !decl.nullable {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!("field {:?} must not be null", decl.name))
                    .err();
            }
            fields.push(value);
        }
        Ok(Row(fields))
    }

    /// Encode as a JSON object. Fields beyond the schema are named `f<idx>`.
    pub fn to_json(&self, schema: &RowSchema) -> serde_json::Value {
        let mut obj = Map::new();
        for (idx, value) in self.0.iter().enumerate() {
            let name = schema
                .fields()
                .get(idx)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("f{idx}"));
            let json = value
                .as_ref()
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null);
            obj.insert(name, json);
        }
        serde_json::Value::Object(obj)
    }
}

impl From<Vec<Option<Value>>> for Row {
    fn from(fields: Vec<Option<Value>>) -> Self {
        Self(fields)
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A row travelling through the pipeline together with its event timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub timestamp: Option<i64>,
    pub row: Row,
}

impl Element {
    pub fn new(timestamp: i64, row: Row) -> Self {
        Self {
            timestamp: Some(timestamp),
            row,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
