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

use std::collections::BTreeSet;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cling::prelude::*;
use comfy_table::presets::NOTHING;
use comfy_table::Table;
use visapi::{
    parse_iso8601, Adapter, Bounds, ColumnSchema, ColumnType, Filter, Range, Value,
    VisualizationApi,
};

/// Command to fetch rows straight from the data endpoint, without SQL.
#[derive(Run, Parser, Collect, Clone, Debug)]
#[cling(run = "run_rows")]
pub struct RowsCommand {
    /// Connection URI, e.g. `https://api.visapi.com/?table=sensors`.
    #[clap(long)]
    pub uri: String,
    /// Column to request, may be repeated. All columns when omitted.
    #[clap(long = "column")]
    pub columns: Vec<String>,
    /// Range on a column as `COLUMN=MIN..MAX`, either end may be empty.
    #[clap(long = "range")]
    pub ranges: Vec<String>,
    #[clap(long)]
    pub limit: Option<usize>,
}

pub async fn run_rows(state: State<crate::cli_env::Env>, args: &RowsCommand) -> Result<()> {
    let adapter = VisualizationApi::from_uri(&args.uri, state.0.options.clone())?;
    let schema = adapter.get_columns().await?;

    let bounds = parse_bounds(&args.ranges, &schema)?;
    let requested: BTreeSet<String> = args.columns.iter().cloned().collect();
    let rows = adapter.get_rows(&bounds, &[], &requested, args.limit).await?;

    let header: Vec<String> = if requested.is_empty() {
        schema.names().map(str::to_string).collect()
    } else {
        requested.into_iter().collect()
    };

    let mut table = Table::new();
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.load_preset(NOTHING);
    table.set_header(header.clone());

    let mut skipped = 0usize;
    for row in rows {
        match row {
            Ok(row) => {
                table.add_row(header.iter().map(|name| match row.get(name) {
                    None | Some(Value::Null) => String::new(),
                    Some(value) => value.to_string(),
                }));
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!(error = %e, "skipping row");
            }
        }
    }
    println!("{table}");
    if skipped > 0 {
        eprintln!("{skipped} row(s) could not be converted");
    }
    Ok(())
}

fn parse_bounds(ranges: &[String], schema: &ColumnSchema) -> Result<Bounds> {
    let mut bounds = Bounds::new();
    for arg in ranges {
        let (column, range) = parse_range(arg, schema)?;
        let range = match bounds.remove(&column) {
            Some(Filter::Range(existing)) => existing.intersect(range),
            _ => range,
        };
        bounds.insert(column, Filter::Range(range));
    }
    Ok(bounds)
}

fn parse_range(arg: &str, schema: &ColumnSchema) -> Result<(String, Range)> {
    let (column, span) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("range `{arg}` must look like COLUMN=MIN..MAX"))?;
    let (min, max) = span
        .split_once("..")
        .ok_or_else(|| anyhow!("range `{arg}` must look like COLUMN=MIN..MAX"))?;
    if column.is_empty() {
        bail!("range `{arg}` has no column");
    }

    let column_type = schema.column_type(column).unwrap_or(ColumnType::String);
    let bound = |raw: &str| -> Result<Option<Value>> {
        if raw.is_empty() {
            return Ok(None);
        }
        parse_value(raw, column_type)
            .map(Some)
            .with_context(|| format!("invalid bound `{raw}` for {column_type} column `{column}`"))
    };
    Ok((column.to_string(), Range::new(bound(min)?, bound(max)?)))
}

fn parse_value(raw: &str, column_type: ColumnType) -> Result<Value> {
    Ok(match column_type {
        ColumnType::String => Value::String(raw.to_string()),
        ColumnType::Integer => Value::Integer(raw.parse()?),
        ColumnType::Float => Value::Float(raw.parse()?),
        ColumnType::DateTime => Value::DateTime(
            parse_iso8601(raw).ok_or_else(|| anyhow!("expected an ISO-8601 timestamp"))?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use visapi::Field;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            Field::new("count", ColumnType::Integer),
            Field::new("at", ColumnType::DateTime),
        ])
    }

    #[test]
    fn test_parse_range() {
        let (column, range) = parse_range("count=1..10", &schema()).unwrap();
        assert_eq!(column, "count");
        assert_eq!(
            range,
            Range::new(Some(Value::Integer(1)), Some(Value::Integer(10)))
        );

        let (_, range) = parse_range("at=2024-01-01T10:00:00..", &schema()).unwrap();
        assert_eq!(
            range.start,
            Some(Value::DateTime(
                parse_iso8601("2024-01-01T10:00:00").unwrap()
            ))
        );
        assert_eq!(range.end, None);

        let (_, range) = parse_range("other=..z", &schema()).unwrap();
        assert_eq!(range.end, Some(Value::String("z".to_string())));
    }

    #[test]
    fn test_parse_range_errors() {
        assert!(parse_range("count", &schema()).is_err());
        assert!(parse_range("count=1", &schema()).is_err());
        assert!(parse_range("=1..2", &schema()).is_err());
        assert!(parse_range("count=x..2", &schema()).is_err());
    }

    #[test]
    fn test_parse_bounds_intersects_repeated_columns() {
        let bounds = parse_bounds(
            &["count=1..10".to_string(), "count=5..".to_string()],
            &schema(),
        )
        .unwrap();
        assert_eq!(
            bounds.get("count"),
            Some(&Filter::Range(Range::new(
                Some(Value::Integer(5)),
                Some(Value::Integer(10))
            )))
        );
    }
}
