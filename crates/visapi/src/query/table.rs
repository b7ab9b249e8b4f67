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

use std::{any::Any, collections::BTreeSet, fmt, sync::Arc};

use async_trait::async_trait;
use datafusion::{
    arrow::{
        array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder, TimestampMicrosecondBuilder},
        datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit},
        record_batch::{RecordBatch, RecordBatchOptions},
    },
    catalog::Session,
    datasource::{TableProvider, TableType},
    error::{DataFusionError, Result as DataFusionResult},
    execution::TaskContext,
    logical_expr::TableProviderFilterPushDown,
    physical_expr::EquivalenceProperties,
    physical_plan::{
        stream::RecordBatchStreamAdapter, DisplayAs, DisplayFormatType, ExecutionMode,
        ExecutionPlan, Partitioning, PlanProperties, SendableRecordBatchStream,
    },
    prelude::Expr,
};
use futures::{StreamExt, TryStreamExt};

use crate::{
    adapter::Adapter,
    errors::AdapterError,
    fields::{ColumnSchema, ColumnType},
    filters::{Bounds, Value},
    query::pushdown,
    rows::{RowRecord, Rows},
};

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::String => DataType::Utf8,
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

/// Arrow schema of a remote table. Every column is nullable.
pub fn arrow_schema(columns: &ColumnSchema) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .fields()
            .iter()
            .map(|f| Field::new(&f.name, arrow_type(f.column_type), true))
            .collect::<Vec<_>>(),
    ))
}

fn external(err: AdapterError) -> DataFusionError {
    DataFusionError::External(Box::new(err))
}

/// `AdapterTableProvider` exposes one remote table to DataFusion.
///
/// Range predicates, the projection and the limit are handed to the adapter.
/// Pushed filters are reported as inexact, so DataFusion still applies them
/// to the rows that come back.
pub struct AdapterTableProvider<A> {
    adapter: Arc<A>,
    schema: SchemaRef,
}

impl<A: Adapter + 'static> AdapterTableProvider<A> {
    /// Discovers the table's columns and builds the provider.
    pub async fn try_new(adapter: Arc<A>) -> Result<Self, AdapterError> {
        let columns = adapter.get_columns().await?;
        Ok(Self {
            schema: arrow_schema(&columns),
            adapter,
        })
    }
}

impl<A: Adapter> fmt::Debug for AdapterTableProvider<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterTableProvider")
            .field("table", &self.adapter.table())
            .field("schema", &self.schema)
            .finish()
    }
}

#[async_trait]
impl<A: Adapter + 'static> TableProvider for AdapterTableProvider<A> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> DataFusionResult<Vec<TableProviderFilterPushDown>> {
        Ok(filters
            .iter()
            .map(|f| {
                if pushdown::is_range_translatable(f) {
                    TableProviderFilterPushDown::Inexact
                } else {
                    TableProviderFilterPushDown::Unsupported
                }
            })
            .collect())
    }

    /// Creates the scan. An empty projection (as in `count(*)`) still fetches
    /// whole rows, only their number is used.
    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        filters: &[Expr],
        limit: Option<usize>,
    ) -> DataFusionResult<Arc<dyn ExecutionPlan>> {
        let projected_schema = match projection {
            Some(projection) => Arc::new(self.schema.project(projection)?),
            None => self.schema.clone(),
        };
        let requested_columns = projected_schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();

        Ok(Arc::new(AdapterScanExec::new(
            self.adapter.clone(),
            projected_schema,
            requested_columns,
            pushdown::bounds_from_exprs(filters),
            limit,
        )))
    }
}

/// Physical scan of a remote table: a single partition fed by one
/// `get_rows` call.
struct AdapterScanExec<A> {
    adapter: Arc<A>,
    projected_schema: SchemaRef,
    requested_columns: BTreeSet<String>,
    bounds: Bounds,
    limit: Option<usize>,
    properties: PlanProperties,
}

impl<A: Adapter + 'static> AdapterScanExec<A> {
    fn new(
        adapter: Arc<A>,
        projected_schema: SchemaRef,
        requested_columns: BTreeSet<String>,
        bounds: Bounds,
        limit: Option<usize>,
    ) -> Self {
        let properties = PlanProperties::new(
            EquivalenceProperties::new(projected_schema.clone()),
            Partitioning::UnknownPartitioning(1),
            ExecutionMode::Bounded,
        );
        Self {
            adapter,
            projected_schema,
            requested_columns,
            bounds,
            limit,
            properties,
        }
    }
}

impl<A: Adapter> fmt::Debug for AdapterScanExec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterScanExec")
            .field("table", &self.adapter.table())
            .field("requested_columns", &self.requested_columns)
            .field("bounds", &self.bounds)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<A: Adapter> DisplayAs for AdapterScanExec<A> {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "AdapterScanExec: table={}, columns={:?}, filters={:?}, limit={:?}",
            self.adapter.table(),
            self.requested_columns,
            self.bounds.keys().collect::<Vec<_>>(),
            self.limit,
        )
    }
}

impl<A: Adapter + 'static> ExecutionPlan for AdapterScanExec<A> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        "AdapterScanExec"
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn schema(&self) -> SchemaRef {
        self.projected_schema.clone()
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        _children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DataFusionResult<Arc<dyn ExecutionPlan>> {
        Ok(self)
    }

    fn execute(
        &self,
        _partition: usize,
        _context: Arc<TaskContext>,
    ) -> DataFusionResult<SendableRecordBatchStream> {
        let adapter = self.adapter.clone();
        let bounds = self.bounds.clone();
        let requested_columns = self.requested_columns.clone();
        let schema = self.projected_schema.clone();
        let limit = self.limit;

        let stream = futures::stream::once(async move {
            let rows = adapter
                .get_rows(&bounds, &[], &requested_columns, limit)
                .await
                .map_err(external)?;
            Ok::<_, DataFusionError>(futures::stream::iter(RowBatches::new(rows, schema, limit)))
        })
        .try_flatten()
        .boxed();

        Ok(Box::pin(RecordBatchStreamAdapter::new(
            self.schema(),
            stream,
        )))
    }
}

/// Groups converted rows into `RecordBatch`es. Rows that fail conversion are
/// logged and skipped.
struct RowBatches {
    rows: Rows,
    schema: SchemaRef,
    limit: Option<usize>,
    processed_count: usize,
}

impl RowBatches {
    const BATCH_SIZE: usize = 1024;

    fn new(rows: Rows, schema: SchemaRef, limit: Option<usize>) -> Self {
        Self {
            rows,
            schema,
            limit,
            processed_count: 0,
        }
    }
}

impl Iterator for RowBatches {
    type Item = DataFusionResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = match self.limit {
            Some(limit) => limit.saturating_sub(self.processed_count).min(Self::BATCH_SIZE),
            None => Self::BATCH_SIZE,
        };
        if batch_size == 0 {
            return None;
        }

        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.rows.next() {
                Some(Ok(row)) => batch.push(row),
                Some(Err(e)) => {
                    tracing::warn!(table = self.rows.table(), error = %e, "skipping row");
                }
                None => break,
            }
        }

        if batch.is_empty() {
            return None;
        }
        self.processed_count += batch.len();
        Some(build_record_batch(&self.schema, &batch))
    }
}

fn cell<'a>(row: &'a RowRecord, column: &str) -> Option<&'a Value> {
    match row.get(column) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value),
    }
}

/// Builds one batch in `schema`'s column order. Missing fields become nulls.
pub(crate) fn build_record_batch(
    schema: &SchemaRef,
    rows: &[RowRecord],
) -> DataFusionResult<RecordBatch> {
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let name = field.name().as_str();
        let array: ArrayRef = match field.data_type() {
            DataType::Utf8 => {
                let mut builder = StringBuilder::new();
                for row in rows {
                    match cell(row, name) {
                        Some(Value::String(s)) => builder.append_value(s),
                        Some(other) => builder.append_value(other.to_string()),
                        None => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            DataType::Int64 => {
                let mut builder = Int64Builder::with_capacity(rows.len());
                for row in rows {
                    builder.append_option(match cell(row, name) {
                        Some(Value::Integer(i)) => Some(*i),
                        Some(Value::Boolean(b)) => Some(i64::from(*b)),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            DataType::Float64 => {
                let mut builder = Float64Builder::with_capacity(rows.len());
                for row in rows {
                    builder.append_option(match cell(row, name) {
                        Some(Value::Float(f)) => Some(*f),
                        Some(Value::Integer(i)) => Some(*i as f64),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            DataType::Timestamp(TimeUnit::Microsecond, None) => {
                let mut builder = TimestampMicrosecondBuilder::with_capacity(rows.len());
                for row in rows {
                    builder.append_option(match cell(row, name) {
                        Some(Value::DateTime(dt)) => Some(dt.and_utc().timestamp_micros()),
                        _ => None,
                    });
                }
                Arc::new(builder.finish())
            }
            other => {
                return Err(DataFusionError::Internal(format!(
                    "unsupported type {other} for column {name}"
                )));
            }
        };
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(schema.clone(), arrays, &options).map_err(DataFusionError::from)
}
