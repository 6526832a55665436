//! CSV parsing with per-column type inference.

use std::collections::HashSet;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Parse comma-separated text into an in-memory [`DataSet`].
///
/// Rules:
///
/// - The first record is the header row and defines the column names (trimmed, non-empty,
///   unique ignoring ASCII case, since warehouse identifiers are case-insensitive).
/// - Every data record must have exactly as many fields as the header.
/// - Column types are inferred from the data, see [`infer_column_type`].
pub fn ingest_csv_from_str(text: &str) -> IngestionResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());
    ingest_csv_from_reader(&mut rdr)
}

/// Parse CSV data from an existing CSV reader.
///
/// The reader must be configured with `has_headers(true)`.
pub fn ingest_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> IngestionResult<DataSet> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(IngestionError::SchemaMismatch {
            message: "input has no header row".to_string(),
        });
    }

    let mut names: Vec<String> = Vec::with_capacity(headers.len());
    let mut seen = HashSet::new();
    for (idx, h) in headers.iter().enumerate() {
        let name = h.trim();
        if name.is_empty() {
            return Err(IngestionError::SchemaMismatch {
                message: format!("header column {} is blank", idx + 1),
            });
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(IngestionError::SchemaMismatch {
                message: format!("duplicate column '{name}' in header (names are case-insensitive)"),
            });
        }
        names.push(name.to_owned());
    }

    // First pass keeps raw cells; types are only known once every row has been seen.
    let mut raw_rows: Vec<csv::StringRecord> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        let record = result?;
        // A flexible reader lets ragged records through; refuse them rather than pad.
        if record.len() != names.len() {
            return Err(IngestionError::SchemaMismatch {
                message: format!(
                    "row {} has {} fields, header has {}",
                    row_idx0 + 2,
                    record.len(),
                    names.len()
                ),
            });
        }
        raw_rows.push(record);
    }

    let fields: Vec<Field> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = infer_column_type(raw_rows.iter().map(|r| r.get(idx).unwrap_or("")));
            Field::new(name, data_type)
        })
        .collect();
    let schema = Schema::new(fields);

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(raw_rows.len());
    for (row_idx0, record) in raw_rows.iter().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (idx, field) in schema.fields.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Infer the narrowest [`DataType`] that every non-empty cell of a column parses as.
///
/// Precedence is `Int64`, `Float64`, `Bool`, then `Utf8`. A column without any non-empty cell
/// is `Utf8`.
pub fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> DataType {
    let mut int_ok = true;
    let mut float_ok = true;
    let mut bool_ok = true;
    let mut any = false;

    for cell in cells {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }
        any = true;
        int_ok = int_ok && trimmed.parse::<i64>().is_ok();
        float_ok = float_ok && trimmed.parse::<f64>().is_ok();
        bool_ok = bool_ok && parse_bool_literal(trimmed).is_some();
        if !(int_ok || float_ok || bool_ok) {
            return DataType::Utf8;
        }
    }

    match (any, int_ok, float_ok, bool_ok) {
        (false, ..) => DataType::Utf8,
        (true, true, _, _) => DataType::Int64,
        (true, false, true, _) => DataType::Float64,
        (true, false, false, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> IngestionResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(trimmed.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| {
            IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Bool => parse_bool_literal(trimmed)
            .map(Value::Bool)
            .ok_or_else(|| IngestionError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: "expected bool (true/false)".to_string(),
            }),
    }
}

// Only the spelled-out literals: `1`/`0` columns must stay integers.
fn parse_bool_literal(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
