//! Parquet staging files.
//!
//! A dataset is written to a local Parquet file so the warehouse can bulk-load it with a single
//! `read_parquet` statement instead of row-by-row inserts.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::basic::{LogicalType, Repetition, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{Type, TypePtr};

use crate::error::WarehouseError;
use crate::types::{DataSet, DataType, Schema, Value};

/// Write `dataset` to a Parquet file at `path` (one row group, every column optional).
///
/// Column order and names are preserved. Fails if a non-null cell does not match its field
/// type.
pub fn write_parquet(dataset: &DataSet, path: impl AsRef<Path>) -> Result<(), WarehouseError> {
    let schema = parquet_schema(&dataset.schema)?;
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path.as_ref())?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;

    let mut row_group = writer.next_row_group()?;
    let mut idx = 0;
    while let Some(mut column) = row_group.next_column()? {
        let field = &dataset.schema.fields[idx];
        match field.data_type {
            DataType::Int64 => {
                let (values, defs) = column_values(dataset, idx, |v| match v {
                    Value::Int64(x) => Some(*x),
                    _ => None,
                })?;
                column.typed::<Int64Type>().write_batch(&values, Some(&defs), None)?;
            }
            DataType::Float64 => {
                let (values, defs) = column_values(dataset, idx, |v| match v {
                    Value::Float64(x) => Some(*x),
                    _ => None,
                })?;
                column.typed::<DoubleType>().write_batch(&values, Some(&defs), None)?;
            }
            DataType::Bool => {
                let (values, defs) = column_values(dataset, idx, |v| match v {
                    Value::Bool(x) => Some(*x),
                    _ => None,
                })?;
                column.typed::<BoolType>().write_batch(&values, Some(&defs), None)?;
            }
            DataType::Utf8 => {
                let (values, defs) = column_values(dataset, idx, |v| match v {
                    Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
                    _ => None,
                })?;
                column.typed::<ByteArrayType>().write_batch(&values, Some(&defs), None)?;
            }
        }
        column.close()?;
        idx += 1;
    }
    row_group.close()?;
    writer.close()?;
    Ok(())
}

fn parquet_schema(schema: &Schema) -> Result<TypePtr, WarehouseError> {
    let mut fields: Vec<TypePtr> = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let (physical, logical) = match field.data_type {
            DataType::Int64 => (PhysicalType::INT64, None),
            DataType::Float64 => (PhysicalType::DOUBLE, None),
            DataType::Bool => (PhysicalType::BOOLEAN, None),
            DataType::Utf8 => (PhysicalType::BYTE_ARRAY, Some(LogicalType::String)),
        };
        let ty = Type::primitive_type_builder(&field.name, physical)
            .with_repetition(Repetition::OPTIONAL)
            .with_logical_type(logical)
            .build()?;
        fields.push(Arc::new(ty));
    }
    let root = Type::group_type_builder("schema").with_fields(fields).build()?;
    Ok(Arc::new(root))
}

/// Non-null values of column `idx` plus one definition level per row (0 = null).
fn column_values<T>(
    dataset: &DataSet,
    idx: usize,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<(Vec<T>, Vec<i16>), WarehouseError> {
    let field = &dataset.schema.fields[idx];
    let mut values = Vec::with_capacity(dataset.row_count());
    let mut defs = Vec::with_capacity(dataset.row_count());
    for (row_idx, value) in dataset.column(idx).enumerate() {
        if matches!(value, Value::Null) {
            defs.push(0);
            continue;
        }
        match extract(value) {
            Some(v) => {
                values.push(v);
                defs.push(1);
            }
            None => {
                return Err(WarehouseError::Other(format!(
                    "row {} column '{}': value {value:?} does not match column type {:?}",
                    row_idx + 1,
                    field.name,
                    field.data_type
                )));
            }
        }
    }
    Ok((values, defs))
}
