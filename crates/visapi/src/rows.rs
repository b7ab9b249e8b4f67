// MIT License
//
// Copyright (c) 2024 Songlin Yang
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Decoding of the data endpoint response into typed rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::errors::{AdapterError, Result};
use crate::fields::{ColumnSchema, ColumnType};
use crate::filters::Value;

/// One converted row, keyed by column name.
pub type RowRecord = BTreeMap<String, Value>;

type RawRecord = Map<String, JsonValue>;

/// Response of the data endpoint. `data` holds the rows as a JSON document
/// encoded inside a string, so it is decoded a second time. The other fields
/// are only logged and may have any shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataEnvelope {
    data: String,
    #[serde(default)]
    columns: Option<JsonValue>,
    #[serde(default, alias = "totalitems")]
    total_items: Option<JsonValue>,
    #[serde(default)]
    query_size: Option<JsonValue>,
}

/// Rows returned by one data request. Records are converted as they are
/// pulled; a record that fails conversion yields an error and iteration
/// continues with the next one.
#[derive(Debug)]
pub struct Rows {
    table: String,
    schema: Arc<ColumnSchema>,
    records: std::vec::IntoIter<RawRecord>,
}

impl Rows {
    pub(crate) fn empty(table: String, schema: Arc<ColumnSchema>) -> Self {
        Self {
            table,
            schema,
            records: Vec::new().into_iter(),
        }
    }

    pub(crate) fn decode(
        table: String,
        endpoint: &str,
        schema: Arc<ColumnSchema>,
        body: &str,
    ) -> Result<Self> {
        let fetch_error = |reason: String| AdapterError::RowFetch {
            table: table.clone(),
            endpoint: endpoint.to_string(),
            reason,
        };

        let envelope: DataEnvelope = serde_json::from_str(body)
            .map_err(|e| fetch_error(format!("invalid response envelope: {e}")))?;
        let records: Vec<RawRecord> = serde_json::from_str(&envelope.data)
            .map_err(|e| fetch_error(format!("invalid `data` payload: {e}")))?;

        tracing::debug!(
            table = %table,
            rows = records.len(),
            columns = ?envelope.columns.as_ref().and_then(JsonValue::as_array).map(Vec::len),
            total_items = ?envelope.total_items,
            query_size = ?envelope.query_size,
            "decoded data response"
        );

        Ok(Self {
            table,
            schema,
            records: records.into_iter(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Arc<ColumnSchema> {
        &self.schema
    }
}

impl Iterator for Rows {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(convert_types(&self.table, &self.schema, record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for Rows {}

/// Converts every field of `record` to the type its column declares. Fields
/// of string columns, and fields the schema does not know, keep their JSON
/// form.
pub fn convert_types(table: &str, schema: &ColumnSchema, record: RawRecord) -> Result<RowRecord> {
    let mut row = RowRecord::new();
    for (column, raw) in record {
        let value = match schema.column_type(&column) {
            Some(expected) if expected != ColumnType::String && !raw.is_null() => {
                convert_value(expected, &raw).map_err(|reason| AdapterError::RowConversion {
                    table: table.to_string(),
                    column: column.clone(),
                    expected,
                    value: raw.to_string(),
                    reason,
                })?
            }
            _ => passthrough(raw),
        };
        row.insert(column, value);
    }
    Ok(row)
}

fn convert_value(expected: ColumnType, raw: &JsonValue) -> Result<Value, String> {
    match expected {
        ColumnType::Integer => to_integer(raw).map(Value::Integer),
        ColumnType::Float => to_float(raw).map(Value::Float),
        ColumnType::DateTime => match raw {
            JsonValue::String(s) => parse_iso8601(s)
                .map(Value::DateTime)
                .ok_or_else(|| "not an ISO-8601 timestamp".to_string()),
            _ => Err("expected a timestamp string".to_string()),
        },
        ColumnType::String => Ok(passthrough(raw.clone())),
    }
}

fn to_integer(raw: &JsonValue) -> Result<i64, String> {
    match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                // fractional numbers are truncated toward zero
                Some(f) if f.is_finite() && f.trunc().abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                _ => Err("number out of integer range".to_string()),
            }
        }
        JsonValue::String(s) => s.trim().parse::<i64>().map_err(|e| e.to_string()),
        JsonValue::Bool(b) => Ok(i64::from(*b)),
        _ => Err("expected an integer".to_string()),
    }
}

fn to_float(raw: &JsonValue) -> Result<f64, String> {
    match raw {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| "number out of float range".to_string()),
        JsonValue::String(s) => s.trim().parse::<f64>().map_err(|e| e.to_string()),
        JsonValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => Err("expected a float".to_string()),
    }
}

fn passthrough(raw: JsonValue) -> Value {
    match raw {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

/// Parses the ISO-8601 forms the remote API emits: `T` or space separated,
/// optional fraction, optional offset (normalized to UTC), or a bare date.
pub fn parse_iso8601(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
