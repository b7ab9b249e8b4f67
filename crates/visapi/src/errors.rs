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

use thiserror::Error;

use crate::fields::ColumnType;

#[derive(Error, Debug, Eq, PartialEq, Clone)]
pub enum AdapterError {
    #[error("uri is not handled by this adapter: {uri}")]
    UnsupportedUri { uri: String },

    #[error("malformed uri {uri}: {reason}")]
    MalformedUri { uri: String, reason: String },

    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("could not fetch columns of table {table} from {endpoint}: {reason}")]
    SchemaFetch {
        table: String,
        endpoint: String,
        reason: String,
    },

    #[error("could not fetch rows of table {table} from {endpoint}: {reason}")]
    RowFetch {
        table: String,
        endpoint: String,
        reason: String,
    },

    #[error("table {table} column {column}: cannot convert {value} to {expected}: {reason}")]
    RowConversion {
        table: String,
        column: String,
        expected: ColumnType,
        value: String,
        reason: String,
    },
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;
