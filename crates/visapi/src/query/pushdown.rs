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

//! Translation of DataFusion filter expressions into adapter predicates.
//!
//! Every remote column only accepts range filters, so equality is turned into
//! a single-point range and several ranges on one column are intersected.
//! Predicates that cannot become a range are still translated, the adapter
//! decides what to do with them.

use chrono::{DateTime, NaiveDateTime};
use datafusion::logical_expr::{Between, BinaryExpr, Expr, Like, Operator};
use datafusion::scalar::ScalarValue;

use crate::filters::{Bounds, Filter, Range, Value};

/// Converts a non-null literal into a [`Value`].
pub fn literal_value(scalar: &ScalarValue) -> Option<Value> {
    let value = match scalar {
        ScalarValue::Boolean(Some(v)) => Value::Boolean(*v),
        ScalarValue::Int8(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::Int16(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::Int32(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::Int64(Some(v)) => Value::Integer(*v),
        ScalarValue::UInt8(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::UInt16(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::UInt32(Some(v)) => Value::Integer(i64::from(*v)),
        ScalarValue::UInt64(Some(v)) => Value::Integer(i64::try_from(*v).ok()?),
        ScalarValue::Float32(Some(v)) => Value::Float(f64::from(*v)),
        ScalarValue::Float64(Some(v)) => Value::Float(*v),
        ScalarValue::Utf8(Some(v)) | ScalarValue::LargeUtf8(Some(v)) | ScalarValue::Utf8View(Some(v)) => {
            Value::String(v.clone())
        }
        ScalarValue::TimestampSecond(Some(v), _) => Value::DateTime(timestamp(*v, 1)?),
        ScalarValue::TimestampMillisecond(Some(v), _) => Value::DateTime(timestamp(*v, 1_000)?),
        ScalarValue::TimestampMicrosecond(Some(v), _) => Value::DateTime(timestamp(*v, 1_000_000)?),
        ScalarValue::TimestampNanosecond(Some(v), _) => {
            Value::DateTime(timestamp(*v, 1_000_000_000)?)
        }
        ScalarValue::Date32(Some(days)) => Value::DateTime(timestamp(i64::from(*days) * 86_400, 1)?),
        ScalarValue::Date64(Some(millis)) => Value::DateTime(timestamp(*millis, 1_000)?),
        _ => return None,
    };
    Some(value)
}

/// Converts `value` ticks of `1 / per_second` seconds since the epoch.
fn timestamp(value: i64, per_second: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?).map(|dt| dt.naive_utc())
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Column(column) => Some(column.name.as_str()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(scalar) => literal_value(scalar),
        _ => None,
    }
}

/// Mirrors a comparison so the column ends up on the left: `5 < a` is `a > 5`.
fn mirror(op: Operator) -> Operator {
    match op {
        Operator::Lt => Operator::Gt,
        Operator::LtEq => Operator::GtEq,
        Operator::Gt => Operator::Lt,
        Operator::GtEq => Operator::LtEq,
        other => other,
    }
}

fn comparison(column: &str, op: Operator, value: Value) -> Option<(String, Filter)> {
    let filter = match op {
        Operator::Eq => Filter::Equal(value),
        Operator::NotEq => Filter::NotEqual(value),
        Operator::Gt => Filter::Range(Range::greater_than(value, false)),
        Operator::GtEq => Filter::Range(Range::greater_than(value, true)),
        Operator::Lt => Filter::Range(Range::less_than(value, false)),
        Operator::LtEq => Filter::Range(Range::less_than(value, true)),
        _ => return None,
    };
    Some((column.to_string(), filter))
}

/// Translates one expression into a predicate on a single column.
pub fn filter_from_expr(expr: &Expr) -> Option<(String, Filter)> {
    match expr {
        Expr::BinaryExpr(BinaryExpr { left, op, right }) => {
            if let (Some(column), Some(value)) = (column_name(left), literal(right)) {
                return comparison(column, *op, value);
            }
            if let (Some(value), Some(column)) = (literal(left), column_name(right)) {
                return comparison(column, mirror(*op), value);
            }
            None
        }
        Expr::Between(Between {
            expr,
            negated: false,
            low,
            high,
        }) => {
            let column = column_name(expr)?;
            let range = Range::new(Some(literal(low)?), Some(literal(high)?));
            Some((column.to_string(), Filter::Range(range)))
        }
        Expr::Like(Like {
            negated: false,
            expr,
            pattern,
            escape_char: None,
            case_insensitive: false,
        }) => match (column_name(expr), literal(pattern)) {
            (Some(column), Some(Value::String(pattern))) => {
                Some((column.to_string(), Filter::Like(pattern)))
            }
            _ => None,
        },
        Expr::IsNull(inner) => Some((column_name(inner)?.to_string(), Filter::IsNull)),
        Expr::IsNotNull(inner) => Some((column_name(inner)?.to_string(), Filter::IsNotNull)),
        _ => None,
    }
}

/// Turns a predicate into a range when the remote api can apply it.
fn as_range(filter: Filter) -> Result<Range, Filter> {
    match filter {
        Filter::Range(range) => Ok(range),
        Filter::Equal(value) => Ok(Range::point(value)),
        other => Err(other),
    }
}

/// Whether `expr` becomes a range the remote api can filter on.
pub fn is_range_translatable(expr: &Expr) -> bool {
    filter_from_expr(expr)
        .map(|(_, filter)| as_range(filter).is_ok())
        .unwrap_or(false)
}

/// Collects the predicates of a conjunction of filters, one per column.
/// Ranges take precedence over other predicate kinds on the same column.
pub fn bounds_from_exprs(exprs: &[Expr]) -> Bounds {
    let mut bounds = Bounds::new();
    for expr in exprs {
        let Some((column, filter)) = filter_from_expr(expr) else {
            tracing::debug!(%expr, "filter cannot be pushed down");
            continue;
        };
        let filter = match as_range(filter) {
            Ok(range) => Filter::Range(range),
            Err(other) => other,
        };

        let merged = match bounds.remove(&column) {
            None => filter,
            Some(existing) => match (existing, filter) {
                (Filter::Range(a), Filter::Range(b)) => Filter::Range(a.intersect(b)),
                (Filter::Range(a), _) => Filter::Range(a),
                (_, Filter::Range(b)) => Filter::Range(b),
                (a, _) => a,
            },
        };
        bounds.insert(column, merged);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::prelude::{col, lit};

    #[test]
    fn test_comparisons() {
        assert_eq!(
            filter_from_expr(&col("a").gt(lit(1i64))),
            Some(("a".into(), Filter::Range(Range::greater_than(Value::Integer(1), false))))
        );
        assert_eq!(
            filter_from_expr(&lit(10i32).gt_eq(col("a"))),
            Some(("a".into(), Filter::Range(Range::less_than(Value::Integer(10), true))))
        );
        assert_eq!(
            filter_from_expr(&col("a").eq(lit("x"))),
            Some(("a".into(), Filter::Equal(Value::String("x".into()))))
        );
        assert_eq!(
            filter_from_expr(&col("a").not_eq(lit(2.5))),
            Some(("a".into(), Filter::NotEqual(Value::Float(2.5))))
        );
        assert_eq!(filter_from_expr(&col("a").gt(col("b"))), None);
        assert_eq!(filter_from_expr(&col("a").gt(lit(ScalarValue::Int64(None)))), None);
    }

    #[test]
    fn test_between_like_and_null_checks() {
        assert_eq!(
            filter_from_expr(&col("a").between(lit(1i64), lit(10i64))),
            Some((
                "a".into(),
                Filter::Range(Range::new(Some(Value::Integer(1)), Some(Value::Integer(10))))
            ))
        );
        assert_eq!(filter_from_expr(&col("a").not_between(lit(1i64), lit(10i64))), None);
        assert_eq!(
            filter_from_expr(&col("s").like(lit("ab%"))),
            Some(("s".into(), Filter::Like("ab%".into())))
        );
        assert_eq!(
            filter_from_expr(&col("s").is_null()),
            Some(("s".into(), Filter::IsNull))
        );
        assert_eq!(
            filter_from_expr(&col("s").is_not_null()),
            Some(("s".into(), Filter::IsNotNull))
        );
    }

    #[test]
    fn test_timestamp_literals() {
        let expect = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let micros = expect.and_utc().timestamp_micros();
        assert_eq!(
            literal_value(&ScalarValue::TimestampMicrosecond(Some(micros), None)),
            Some(Value::DateTime(expect))
        );
        assert_eq!(
            literal_value(&ScalarValue::TimestampSecond(Some(micros / 1_000_000), None)),
            Some(Value::DateTime(expect))
        );
        assert_eq!(
            literal_value(&ScalarValue::Date32(Some(1))),
            Some(Value::DateTime(
                NaiveDateTime::parse_from_str("1970-01-02 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
            ))
        );
    }

    #[test]
    fn test_range_translatable() {
        assert!(is_range_translatable(&col("a").lt(lit(3i64))));
        assert!(is_range_translatable(&col("a").eq(lit(3i64))));
        assert!(!is_range_translatable(&col("a").not_eq(lit(3i64))));
        assert!(!is_range_translatable(&col("a").is_null()));
        assert!(!is_range_translatable(&col("a").gt(col("b"))));
    }

    #[test]
    fn test_bounds_from_exprs() {
        let bounds = bounds_from_exprs(&[
            col("a").gt_eq(lit(1i64)),
            col("a").lt(lit(10i64)),
            col("a").gt(lit(3i64)),
            col("b").eq(lit("x")),
            col("c").is_null(),
            col("c").lt_eq(lit(2.0)),
            col("d").not_eq(lit(1i64)),
            col("e").gt(col("f")),
        ]);

        assert_eq!(
            bounds.get("a"),
            Some(&Filter::Range(Range {
                start: Some(Value::Integer(3)),
                end: Some(Value::Integer(10)),
                include_start: false,
                include_end: false,
            }))
        );
        assert_eq!(
            bounds.get("b"),
            Some(&Filter::Range(Range::point(Value::String("x".into()))))
        );
        assert_eq!(
            bounds.get("c"),
            Some(&Filter::Range(Range::less_than(Value::Float(2.0), true)))
        );
        assert_eq!(bounds.get("d"), Some(&Filter::NotEqual(Value::Integer(1))));
        assert_eq!(bounds.len(), 4);
    }
}
