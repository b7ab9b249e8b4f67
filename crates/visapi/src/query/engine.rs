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

use std::sync::Arc;

use datafusion::{datasource::TableProvider, error::DataFusionError, prelude::SessionContext};

use crate::{
    adapter::{Adapter, VisApiOptions, VisualizationApi},
    query::table::AdapterTableProvider,
};

/// `QueryEngine` wraps DataFusion's `SessionContext` and registers remote
/// visualization tables so they can be queried with SQL.
pub struct QueryEngine {
    ctx: SessionContext,
    options: VisApiOptions,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::with_options(VisApiOptions::default())
    }

    /// Creates an engine whose `register_uri` tables share `options`.
    pub fn with_options(options: VisApiOptions) -> Self {
        Self {
            ctx: SessionContext::new(),
            options,
        }
    }

    /// Registers a `TableProvider` under `table_name`.
    pub fn register_table(
        &self,
        table_name: &str,
        provider: Arc<dyn TableProvider>,
    ) -> Result<(), DataFusionError> {
        self.ctx.register_table(table_name, provider).map(|_| ())
    }

    /// Resolves `connection_uri` to a remote table, discovers its columns and
    /// registers it under `table_name`.
    pub async fn register_uri(
        &self,
        table_name: &str,
        connection_uri: &str,
    ) -> Result<(), DataFusionError> {
        let adapter = VisualizationApi::from_uri(connection_uri, self.options.clone())
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        tracing::debug!(table = adapter.table(), name = table_name, "registering remote table");

        let provider = AdapterTableProvider::try_new(Arc::new(adapter))
            .await
            .map_err(|e| DataFusionError::External(Box::new(e)))?;
        self.register_table(table_name, Arc::new(provider))
    }

    /// Returns the underlying DataFusion `SessionContext`.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}
