use arrow::array::{
    Array, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
    TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};
use crate::row::{DataKind, Element, FieldDecl, Row, RowSchema, Value};

/// Derive a [`RowSchema`] from an Arrow schema.
///
/// | Arrow Type            | → | DataKind  |
/// |-----------------------|---|-----------|
/// | Int64                 | → | Int       |
/// | Float64               | → | Float     |
/// | Utf8                  | → | Str       |
/// | Boolean               | → | Bool      |
/// | Timestamp(Ms\|Ns, _)  | → | Timestamp |
pub fn schema_from_arrow(schema: &Schema) -> CoreResult<RowSchema> {
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let kind = match field.data_type() {
            DataType::Int64 => DataKind::Int,
            DataType::Float64 => DataKind::Float,
            DataType::Utf8 => DataKind::Str,
            DataType::Boolean => DataKind::Bool,
            DataType::Timestamp(TimeUnit::Millisecond | TimeUnit::Nanosecond, _) => {
                DataKind::Timestamp
            }
            other => {
                return StructError::from(CoreReason::DataFormat)
                    .with_detail(format!(
                        "column {:?}: unsupported arrow type {other}",
                        field.name()
                    ))
                    .err();
            }
        };
        fields.push(FieldDecl {
            name: field.name().clone(),
            kind,
            nullable: field.is_nullable(),
        });
    }
    Ok(RowSchema::new(fields))
}

/// Convert a [`RecordBatch`] into rows laid out according to `target`.
///
/// Columns are matched by name; target fields without a matching column are
/// null. Arrow nulls are preserved as `None`. Nanosecond timestamps are
/// truncated to milliseconds.
pub fn batch_to_rows(batch: &RecordBatch, target: &RowSchema) -> Vec<Row> {
    let schema = batch.schema();
    let columns: Vec<Option<usize>> = target
        .fields()
        .iter()
        .map(|f| schema.index_of(&f.name).ok())
        .collect();

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let fields = columns
            .iter()
            .map(|col| {
                let col = batch.column((*col)?);
                if col.is_null(row) {
                    return None;
                }
                extract_value(col.as_ref(), row)
            })
            .collect();
        rows.push(Row::new(fields));
    }
    rows
}

/// Convert a batch into timestamped elements, taking event time from `time_column`.
pub fn batch_to_elements(
    batch: &RecordBatch,
    target: &RowSchema,
    time_column: &str,
) -> CoreResult<Vec<Element>> {
    let Some(time_idx) = target.index_of(time_column) else {
        return StructError::from(CoreReason::DataFormat)
            .with_detail(format!("time column {time_column:?} not in schema"))
            .err();
    };
    Ok(batch_to_rows(batch, target)
        .into_iter()
        .map(|row| Element {
            timestamp: row.get(time_idx).and_then(Value::as_i64),
            row,
        })
        .collect())
}

fn extract_value(col: &dyn Array, row: usize) -> Option<Value> {
    match col.data_type() {
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>()?;
            Some(Value::Int(arr.value(row)))
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>()?;
            Some(Value::Float(arr.value(row)))
        }
        DataType::Utf8 => {
            let arr = col.as_any().downcast_ref::<StringArray>()?;
            Some(Value::Str(arr.value(row).to_string()))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>()?;
            Some(Value::Bool(arr.value(row)))
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            let arr = col.as_any().downcast_ref::<TimestampMillisecondArray>()?;
            Some(Value::Timestamp(arr.value(row)))
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            let arr = col.as_any().downcast_ref::<TimestampNanosecondArray>()?;
            Some(Value::Timestamp(arr.value(row).div_euclid(1_000_000)))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
