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
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;
use typed_builder::TypedBuilder;
use url::Url;

use crate::errors::{AdapterError, Result};
use crate::fields::{ColumnDescriptor, ColumnSchema, Order};
use crate::filters::{build_filters, Bounds, FilterDescriptor};
use crate::rows::Rows;
use crate::transport::{HttpTransport, Transport};
use crate::uri;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://host.docker.internal:8080/api/visualization/";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const VISUALIZATION_TYPE: &str = "line";
const AGG_FUNCTION: &str = "AVG";
const TASK_ID: &str = "1";

/// What `get_rows` does when the data endpoint answers with a status other than 200.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum FetchErrorPolicy {
    /// Fail with [`AdapterError::RowFetch`].
    #[default]
    Strict,
    /// Log the failure and return no rows.
    Empty,
}

/// HTTP method of the column listing request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum DiscoveryMethod {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct VisApiOptions {
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    base_url: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,
    #[builder(default)]
    fetch_error_policy: FetchErrorPolicy,
    #[builder(default)]
    discovery_method: DiscoveryMethod,
    /// Replaces the default `reqwest` transport.
    #[builder(default, setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,
}

impl VisApiOptions {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fetch_error_policy(&self) -> FetchErrorPolicy {
        self.fetch_error_policy
    }
}

impl Default for VisApiOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The contract a query engine drives a remote table through: detect, parse,
/// construct, then `get_columns` and `get_rows` as often as its plans need.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Connection arguments extracted by [`Adapter::parse_uri`].
    type Args;

    fn supports(uri: &str) -> bool
    where
        Self: Sized;

    fn parse_uri(uri: &str) -> Result<Self::Args>
    where
        Self: Sized;

    /// Name of the remote table, for display.
    fn table(&self) -> &str;

    async fn get_columns(&self) -> Result<Arc<ColumnSchema>>;

    /// Fetches the rows matching `bounds`. An empty `requested_columns` asks for
    /// every column. `order` is not forwarded to the remote api, so rows come
    /// back in whatever order it produces.
    async fn get_rows(
        &self,
        bounds: &Bounds,
        order: &[(String, Order)],
        requested_columns: &BTreeSet<String>,
        limit: Option<usize>,
    ) -> Result<Rows>;
}

/// Body of the data request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub visualization_type: &'static str,
    pub columns: Vec<String>,
    pub agg_function: &'static str,
    pub group_by: Vec<String>,
    pub filters: Vec<FilterDescriptor>,
    pub constraints: serde_json::Map<String, serde_json::Value>,
    pub task_id: &'static str,
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn new(columns: Vec<String>, filters: Vec<FilterDescriptor>, limit: Option<usize>) -> Self {
        Self {
            visualization_type: VISUALIZATION_TYPE,
            columns,
            agg_function: AGG_FUNCTION,
            group_by: Vec::new(),
            filters,
            constraints: serde_json::Map::new(),
            task_id: TASK_ID,
            limit,
        }
    }
}

/// Adapter for one table of the visualization API.
#[derive(Debug)]
pub struct VisualizationApi {
    table: String,
    base_url: Url,
    options: VisApiOptions,
    transport: Arc<dyn Transport>,
    columns: OnceCell<Arc<ColumnSchema>>,
}

impl VisualizationApi {
    /// Creates the adapter without touching the network; columns are
    /// discovered on first use.
    pub fn new(table: impl Into<String>, options: VisApiOptions) -> Result<Self> {
        let base_url = Url::parse(&options.base_url).map_err(|e| AdapterError::InvalidBaseUrl {
            url: options.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::InvalidBaseUrl {
                url: options.base_url.clone(),
                reason: "url cannot carry a path".to_string(),
            });
        }

        let transport: Arc<dyn Transport> = match &options.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::new(options.timeout)?),
        };

        Ok(Self {
            table: table.into(),
            base_url,
            options,
            transport,
            columns: OnceCell::new(),
        })
    }

    /// Detects, parses and constructs in one step.
    pub fn from_uri(connection_uri: &str, options: VisApiOptions) -> Result<Self> {
        if !Self::supports(connection_uri) {
            return Err(AdapterError::UnsupportedUri {
                uri: connection_uri.to_string(),
            });
        }
        let table = Self::parse_uri(connection_uri)?;
        Self::new(table, options)
    }

    pub fn options(&self) -> &VisApiOptions {
        &self.options
    }

    /// Appends `segments` to the base url, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdapterError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Column names to request: schema order first, then names the schema
    /// does not know.
    fn request_columns(schema: &ColumnSchema, requested: &BTreeSet<String>) -> Vec<String> {
        if requested.is_empty() {
            return schema.names().map(str::to_string).collect();
        }
        let mut columns: Vec<String> = schema
            .names()
            .filter(|name| requested.contains(*name))
            .map(str::to_string)
            .collect();
        columns.extend(
            requested
                .iter()
                .filter(|name| schema.get(name).is_none())
                .cloned(),
        );
        columns
    }

    async fn fetch_columns(&self) -> Result<Arc<ColumnSchema>> {
        let endpoint = self.endpoint(&["data", &self.table, "columns"])?;
        let schema_error = |reason: String| AdapterError::SchemaFetch {
            table: self.table.clone(),
            endpoint: endpoint.to_string(),
            reason,
        };

        tracing::debug!(table = %self.table, %endpoint, method = ?self.options.discovery_method, "discovering columns");
        let response = match self.options.discovery_method {
            DiscoveryMethod::Get => self.transport.get(&endpoint).await,
            DiscoveryMethod::Post => {
                self.transport
                    .post_json(&endpoint, &serde_json::Value::Object(Default::default()))
                    .await
            }
        }
        .map_err(|e| schema_error(failure_reason(e)))?;

        if !response.is_ok() {
            return Err(schema_error(format!("unexpected status {}", response.status)));
        }

        let descriptors: Vec<ColumnDescriptor> = serde_json::from_str(&response.body)
            .map_err(|e| schema_error(format!("invalid column listing: {e}")))?;
        let schema = ColumnSchema::from_descriptors(&descriptors);
        tracing::info!(table = %self.table, columns = schema.len(), "discovered columns");
        Ok(Arc::new(schema))
    }
}

fn failure_reason(err: AdapterError) -> String {
    match err {
        AdapterError::Http { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[async_trait]
impl Adapter for VisualizationApi {
    type Args = String;

    fn supports(connection_uri: &str) -> bool {
        uri::supports(connection_uri)
    }

    fn parse_uri(connection_uri: &str) -> Result<String> {
        uri::parse_uri(connection_uri)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn get_columns(&self) -> Result<Arc<ColumnSchema>> {
        self.columns
            .get_or_try_init(|| self.fetch_columns())
            .await
            .map(Arc::clone)
    }

    async fn get_rows(
        &self,
        bounds: &Bounds,
        order: &[(String, Order)],
        requested_columns: &BTreeSet<String>,
        limit: Option<usize>,
    ) -> Result<Rows> {
        let schema = self.get_columns().await?;
        if !order.is_empty() {
            tracing::debug!(table = %self.table, ?order, "sort order is not forwarded to the remote api");
        }

        let request = QueryRequest::new(
            Self::request_columns(&schema, requested_columns),
            build_filters(bounds, &schema),
            limit,
        );
        let endpoint = self.endpoint(&["data", &self.table])?;
        let fetch_error = |reason: String| AdapterError::RowFetch {
            table: self.table.clone(),
            endpoint: endpoint.to_string(),
            reason,
        };

        let body = serde_json::to_value(&request)
            .map_err(|e| fetch_error(format!("could not encode request: {e}")))?;
        tracing::debug!(table = %self.table, %endpoint, %body, "fetching rows");

        let response = self
            .transport
            .post_json(&endpoint, &body)
            .await
            .map_err(|e| fetch_error(failure_reason(e)))?;

        if !response.is_ok() {
            match self.options.fetch_error_policy {
                FetchErrorPolicy::Strict => {
                    return Err(fetch_error(format!("unexpected status {}", response.status)));
                }
                FetchErrorPolicy::Empty => {
                    tracing::error!(
                        table = %self.table,
                        %endpoint,
                        status = response.status,
                        "data request failed, returning no rows"
                    );
                    return Ok(Rows::empty(self.table.clone(), schema));
                }
            }
        }

        Rows::decode(self.table.clone(), endpoint.as_str(), schema, &response.body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fields::ColumnType;
    use crate::filters::{Filter, Range, Value};
    use crate::rows::RowRecord;
    use crate::transport::HttpResponse;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers column listings and data requests from canned responses and
    /// records what it was sent.
    #[derive(Debug)]
    pub(crate) struct MockTransport {
        columns: HttpResponse,
        data: HttpResponse,
        pub(crate) get_calls: AtomicUsize,
        pub(crate) post_calls: AtomicUsize,
        pub(crate) requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockTransport {
        pub(crate) fn new(columns: serde_json::Value, data: HttpResponse) -> Arc<Self> {
            Arc::new(Self {
                columns: HttpResponse::new(200, columns.to_string()),
                data,
                get_calls: AtomicUsize::new(0),
                post_calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn with_rows(columns: serde_json::Value, rows: serde_json::Value) -> Arc<Self> {
            let body = json!({"data": rows.to_string()}).to_string();
            Self::new(columns, HttpResponse::new(200, body))
        }

        pub(crate) fn last_request(&self) -> (String, serde_json::Value) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &Url) -> Result<HttpResponse> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            assert!(url.path().ends_with("/columns"), "unexpected get {url}");
            Ok(self.columns.clone())
        }

        async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<HttpResponse> {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            if url.path().ends_with("/columns") {
                return Ok(self.columns.clone());
            }
            Ok(self.data.clone())
        }
    }

    fn adapter(transport: Arc<MockTransport>, policy: FetchErrorPolicy) -> VisualizationApi {
        VisualizationApi::new(
            "sensors",
            VisApiOptions::builder()
                .base_url("http://remote.test/api/visualization/")
                .fetch_error_policy(policy)
                .transport(transport as Arc<dyn Transport>)
                .build(),
        )
        .unwrap()
    }

    fn columns() -> serde_json::Value {
        json!([
            {"name": "a", "type": "INTEGER"},
            {"name": "b", "type": "LOCAL_DATE_TIME"},
        ])
    }

    #[tokio::test]
    async fn test_get_columns_is_cached() {
        let transport = MockTransport::with_rows(columns(), json!([]));
        let adapter = adapter(transport.clone(), FetchErrorPolicy::Strict);

        let first = adapter.get_columns().await.unwrap();
        let second = adapter.get_columns().await.unwrap();

        assert_eq!(transport.get_calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.column_type("a"), Some(ColumnType::Integer));
        assert_eq!(first.column_type("b"), Some(ColumnType::DateTime));
    }

    #[tokio::test]
    async fn test_type_tags_stable_across_instances() {
        let transport = MockTransport::with_rows(columns(), json!([]));
        let first = adapter(transport.clone(), FetchErrorPolicy::Strict)
            .get_columns()
            .await
            .unwrap();
        let second = adapter(transport.clone(), FetchErrorPolicy::Strict)
            .get_columns()
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.get_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_post_discovery() {
        let transport = MockTransport::with_rows(columns(), json!([]));
        let adapter = VisualizationApi::new(
            "sensors",
            VisApiOptions::builder()
                .discovery_method(DiscoveryMethod::Post)
                .transport(transport.clone() as Arc<dyn Transport>)
                .build(),
        )
        .unwrap();

        adapter.get_columns().await.unwrap();
        assert_eq!(transport.get_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            transport.last_request(),
            (
                "http://host.docker.internal:8080/api/visualization/data/sensors/columns"
                    .to_string(),
                json!({})
            )
        );
    }

    #[tokio::test]
    async fn test_get_rows_converts_types() {
        let transport = MockTransport::new(
            json!([{"name": "a", "type": "INTEGER"}]),
            HttpResponse::new(200, r#"{"data": "[{\"a\": \"5\"}]"}"#),
        );
        let adapter = adapter(transport, FetchErrorPolicy::Strict);

        let rows: Vec<RowRecord> = adapter
            .get_rows(&Bounds::new(), &[], &BTreeSet::new(), None)
            .await
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![RowRecord::from([("a".to_string(), Value::Integer(5))])]
        );
    }

    #[tokio::test]
    async fn test_get_rows_request_payload() {
        let transport = MockTransport::with_rows(columns(), json!([]));
        let adapter = adapter(transport.clone(), FetchErrorPolicy::Strict);

        let bounds = Bounds::from([
            (
                "a".to_string(),
                Filter::Range(Range::new(Some(Value::Integer(1)), Some(Value::Integer(10)))),
            ),
            ("b".to_string(), Filter::NotEqual(Value::Integer(0))),
        ]);
        let requested = BTreeSet::from(["b".to_string(), "a".to_string(), "zz".to_string()]);
        let order = vec![("a".to_string(), Order::Descending)];

        let rows = adapter
            .get_rows(&bounds, &order, &requested, Some(20))
            .await
            .unwrap();
        assert_eq!(rows.count(), 0);

        let (url, body) = transport.last_request();
        assert_eq!(url, "http://remote.test/api/visualization/data/sensors");
        assert_eq!(
            body,
            json!({
                "visualizationType": "line",
                "columns": ["a", "b", "zz"],
                "aggFunction": "AVG",
                "groupBy": [],
                "filters": [
                    {"column": "a", "type": "range", "value": {"min": 1, "max": 10}}
                ],
                "constraints": {},
                "taskId": "1",
                "limit": 20,
            })
        );
    }

    #[tokio::test]
    async fn test_get_rows_all_columns_and_null_limit() {
        let transport = MockTransport::with_rows(columns(), json!([]));
        let adapter = adapter(transport.clone(), FetchErrorPolicy::Strict);

        adapter
            .get_rows(&Bounds::new(), &[], &BTreeSet::new(), None)
            .await
            .unwrap();

        let (_, body) = transport.last_request();
        assert_eq!(body["columns"], json!(["a", "b"]));
        assert_eq!(body["limit"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_get_rows_strict_on_server_error() {
        let transport = MockTransport::new(columns(), HttpResponse::new(500, "boom"));
        let adapter = adapter(transport, FetchErrorPolicy::Strict);

        let err = adapter
            .get_rows(&Bounds::new(), &[], &BTreeSet::new(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AdapterError::RowFetch {
                table: "sensors".to_string(),
                endpoint: "http://remote.test/api/visualization/data/sensors".to_string(),
                reason: "unexpected status 500".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_rows_empty_on_server_error() {
        let transport = MockTransport::new(columns(), HttpResponse::new(500, "boom"));
        let adapter = adapter(transport, FetchErrorPolicy::Empty);

        let rows = adapter
            .get_rows(&Bounds::new(), &[], &BTreeSet::new(), None)
            .await
            .unwrap();
        assert_eq!(rows.count(), 0);
    }

    #[tokio::test]
    async fn test_get_rows_keeps_going_after_bad_row() {
        let transport = MockTransport::with_rows(
            columns(),
            json!([{"a": "1"}, {"a": "one"}, {"a": "3", "b": "2024-01-01T00:00:00"}]),
        );
        let adapter = adapter(transport, FetchErrorPolicy::Strict);

        let results: Vec<_> = adapter
            .get_rows(&Bounds::new(), &[], &BTreeSet::new(), None)
            .await
            .unwrap()
            .collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AdapterError::RowConversion { .. })));
        assert_eq!(results[2].as_ref().unwrap()["a"], Value::Integer(3));
    }

    #[tokio::test]
    async fn test_schema_fetch_failure_is_not_cached() {
        #[derive(Debug, Default)]
        struct FlakyTransport {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Transport for FlakyTransport {
            async fn get(&self, _url: &Url) -> Result<HttpResponse> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Ok(HttpResponse::new(502, "bad gateway"));
                }
                Ok(HttpResponse::new(200, r#"[{"name": "a", "type": "STRING"}]"#))
            }

            async fn post_json(&self, _url: &Url, _body: &serde_json::Value) -> Result<HttpResponse> {
                unreachable!()
            }
        }

        let transport = Arc::new(FlakyTransport::default());
        let adapter = VisualizationApi::new(
            "t",
            VisApiOptions::builder()
                .base_url("http://remote.test")
                .transport(transport.clone() as Arc<dyn Transport>)
                .build(),
        )
        .unwrap();

        assert_eq!(
            adapter.get_columns().await.unwrap_err(),
            AdapterError::SchemaFetch {
                table: "t".to_string(),
                endpoint: "http://remote.test/data/t/columns".to_string(),
                reason: "unexpected status 502".to_string(),
            }
        );
        let schema = adapter.get_columns().await.unwrap();
        assert_eq!(schema.column_type("a"), Some(ColumnType::String));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_schema_fetch_malformed_json() {
        let transport = Arc::new(MockTransport {
            columns: HttpResponse::new(200, "{\"oops\": true}"),
            data: HttpResponse::new(200, "{}"),
            get_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        let adapter = adapter(transport, FetchErrorPolicy::Strict);

        let err = adapter.get_columns().await.unwrap_err();
        assert!(
            matches!(err, AdapterError::SchemaFetch { ref reason, .. } if reason.starts_with("invalid column listing")),
            "{err:?}"
        );
    }

    #[test]
    fn test_endpoint_encodes_table() {
        let adapter = VisualizationApi::new(
            "my table/1",
            VisApiOptions::builder().base_url("http://remote.test/api").build(),
        )
        .unwrap();
        assert_eq!(
            adapter.endpoint(&["data", adapter.table()]).unwrap().as_str(),
            "http://remote.test/api/data/my%20table%2F1"
        );
    }

    #[test]
    fn test_from_uri() {
        let adapter = VisualizationApi::from_uri(
            "https://api.visapi.com/?table=sensors",
            VisApiOptions::default(),
        )
        .unwrap();
        assert_eq!(adapter.table(), "sensors");
        assert_eq!(adapter.options().base_url(), DEFAULT_BASE_URL);

        let err = VisualizationApi::from_uri("https://example.com/?table=x", VisApiOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            AdapterError::UnsupportedUri {
                uri: "https://example.com/?table=x".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = VisualizationApi::new(
            "t",
            VisApiOptions::builder().base_url("mailto:someone").build(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidBaseUrl { .. }));
    }
}
