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

mod adapter;
mod errors;
mod fields;
mod filters;
pub mod query;
mod rows;
mod transport;
mod uri;

pub use adapter::{
    Adapter, DiscoveryMethod, FetchErrorPolicy, QueryRequest, VisApiOptions, VisualizationApi,
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
};
pub use errors::{AdapterError, Result};
pub use fields::{ColumnDescriptor, ColumnSchema, ColumnType, Field, FilterKind, Order};
pub use filters::{build_filters, Bounds, Filter, FilterDescriptor, Range, RangeValue, Value};
pub use rows::{convert_types, parse_iso8601, RowRecord, Rows};
pub use transport::{HttpResponse, HttpTransport, Transport};
pub use uri::{parse_uri, supports, RECOGNIZED_HOST, TABLE_PARAM};
