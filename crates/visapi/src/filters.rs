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

//! Predicates handed to the adapter and their wire form.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::fields::ColumnSchema;

/// A typed cell or bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Orders two values when they are of comparable kinds. Integers and
    /// floats compare numerically with each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// JSON form keeping numbers and booleans native.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(_) => serde_json::Value::String(self.to_string()),
        }
    }

    /// JSON form with every non-null value rendered as a string.
    pub fn to_json_string(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            // integral floats keep a trailing `.0` so they read back as floats
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::DateTime(dt) if dt.nanosecond() == 0 => {
                write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
            }
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f")),
        }
    }
}

/// A `[start, end]` restriction where either endpoint may be open.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Option<Value>,
    pub end: Option<Value>,
    pub include_start: bool,
    pub include_end: bool,
}

impl Range {
    pub fn new(start: Option<Value>, end: Option<Value>) -> Self {
        Self {
            start,
            end,
            include_start: true,
            include_end: true,
        }
    }

    pub fn point(value: Value) -> Self {
        Self::new(Some(value.clone()), Some(value))
    }

    pub fn greater_than(value: Value, inclusive: bool) -> Self {
        Self {
            start: Some(value),
            end: None,
            include_start: inclusive,
            include_end: false,
        }
    }

    pub fn less_than(value: Value, inclusive: bool) -> Self {
        Self {
            start: None,
            end: Some(value),
            include_start: false,
            include_end: inclusive,
        }
    }

    /// Narrows `self` by `other`. When two endpoints cannot be compared the
    /// one already in `self` is kept.
    pub fn intersect(self, other: Range) -> Range {
        let (start, include_start) = tighter(
            (self.start, self.include_start),
            (other.start, other.include_start),
            Ordering::Greater,
        );
        let (end, include_end) = tighter(
            (self.end, self.include_end),
            (other.end, other.include_end),
            Ordering::Less,
        );
        Range {
            start,
            end,
            include_start,
            include_end,
        }
    }
}

fn tighter(
    current: (Option<Value>, bool),
    candidate: (Option<Value>, bool),
    wins: Ordering,
) -> (Option<Value>, bool) {
    match (&current.0, &candidate.0) {
        (None, _) => candidate,
        (_, None) => current,
        (Some(a), Some(b)) => match b.compare(a) {
            Some(Ordering::Equal) => (current.0, current.1 && candidate.1),
            Some(ord) if ord == wins => candidate,
            _ => current,
        },
    }
}

/// A predicate on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Range(Range),
    Equal(Value),
    NotEqual(Value),
    Like(String),
    IsNull,
    IsNotNull,
}

/// Predicates keyed by column name.
pub type Bounds = BTreeMap<String, Filter>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeValue {
    pub min: serde_json::Value,
    pub max: serde_json::Value,
}

/// Filter element of the data request, `{column, type: "range", value: {min, max}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterDescriptor {
    pub column: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: RangeValue,
}

/// Translates `bounds` into the remote filter list. Only ranges are sent;
/// other predicate kinds are dropped. Endpoints of string and datetime columns
/// are sent as strings, everything else keeps its native JSON form.
pub fn build_filters(bounds: &Bounds, schema: &ColumnSchema) -> Vec<FilterDescriptor> {
    let mut filters = Vec::with_capacity(bounds.len());
    for (column, filter) in bounds {
        let Filter::Range(range) = filter else {
            tracing::debug!(column = %column, ?filter, "dropping predicate the remote api cannot apply");
            continue;
        };

        let stringify = match schema.column_type(column) {
            Some(column_type) => column_type.stringifies_bounds(),
            None => {
                tracing::warn!(column = %column, "filter on a column missing from the schema");
                false
            }
        };
        let encode = |v: &Option<Value>| match v {
            None => serde_json::Value::Null,
            Some(v) if stringify => v.to_json_string(),
            Some(v) => v.to_json(),
        };

        filters.push(FilterDescriptor {
            column: column.clone(),
            kind: "range",
            value: RangeValue {
                min: encode(&range.start),
                max: encode(&range.end),
            },
        });
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ColumnType, Field};
    use chrono::NaiveDate;
    use serde_json::json;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            Field::new("a", ColumnType::Integer),
            Field::new("b", ColumnType::DateTime),
            Field::new("c", ColumnType::String),
            Field::new("d", ColumnType::Float),
        ])
    }

    fn datetime(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_numeric_range_stays_numeric() {
        let bounds = Bounds::from([(
            "a".to_string(),
            Filter::Range(Range::new(Some(Value::Integer(1)), Some(Value::Integer(10)))),
        )]);

        let filters = build_filters(&bounds, &schema());
        assert_eq!(
            serde_json::to_value(&filters).unwrap(),
            json!([{"column": "a", "type": "range", "value": {"min": 1, "max": 10}}])
        );
    }

    #[test]
    fn test_datetime_range_is_stringified() {
        let bounds = Bounds::from([(
            "b".to_string(),
            Filter::Range(Range::new(
                Some(Value::DateTime(datetime(8))),
                Some(Value::DateTime(datetime(17))),
            )),
        )]);

        let filters = build_filters(&bounds, &schema());
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].value.min, json!("2024-03-01 08:00:00"));
        assert_eq!(filters[0].value.max, json!("2024-03-01 17:00:00"));
    }

    #[test]
    fn test_string_column_stringifies_numbers_and_keeps_open_ends() {
        let bounds = Bounds::from([(
            "c".to_string(),
            Filter::Range(Range::greater_than(Value::Integer(5), true)),
        )]);

        let filters = build_filters(&bounds, &schema());
        assert_eq!(filters[0].value.min, json!("5"));
        assert_eq!(filters[0].value.max, serde_json::Value::Null);
    }

    #[test]
    fn test_unknown_column_keeps_native_values() {
        let bounds = Bounds::from([(
            "zzz".to_string(),
            Filter::Range(Range::less_than(Value::Float(2.5), false)),
        )]);

        let filters = build_filters(&bounds, &schema());
        assert_eq!(filters[0].value.min, serde_json::Value::Null);
        assert_eq!(filters[0].value.max, json!(2.5));
    }

    #[test]
    fn test_non_range_predicates_are_dropped() {
        let bounds = Bounds::from([
            ("a".to_string(), Filter::Equal(Value::Integer(3))),
            ("b".to_string(), Filter::IsNull),
            ("c".to_string(), Filter::Like("x%".to_string())),
            (
                "d".to_string(),
                Filter::Range(Range::new(Some(Value::Float(0.5)), None)),
            ),
        ]);

        let filters = build_filters(&bounds, &schema());
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].column, "d");
        assert_eq!(filters[0].value.min, json!(0.5));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.25).to_string(), "2.25");
        assert_eq!(Value::Integer(-4).to_string(), "-4");
        let with_micros = datetime(1)
            .with_nanosecond(250_000_000)
            .unwrap();
        assert_eq!(
            Value::DateTime(with_micros).to_string(),
            "2024-03-01 01:00:00.250000"
        );
    }

    #[test]
    fn test_range_intersect() {
        let a = Range::greater_than(Value::Integer(1), true);
        let b = Range::greater_than(Value::Integer(5), false);
        let c = Range::less_than(Value::Float(9.5), true);

        let merged = a.intersect(b).intersect(c);
        assert_eq!(merged.start, Some(Value::Integer(5)));
        assert!(!merged.include_start);
        assert_eq!(merged.end, Some(Value::Float(9.5)));
        assert!(merged.include_end);

        let same = Range::greater_than(Value::Integer(5), true)
            .intersect(Range::greater_than(Value::Integer(5), false));
        assert!(!same.include_start);
    }
}
