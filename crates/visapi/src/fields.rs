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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a remote column, as exposed to the query engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    DateTime,
}

impl ColumnType {
    /// Maps a type name reported by the remote API. Names outside the known
    /// set fall back to [`ColumnType::String`].
    pub fn from_source(type_name: &str) -> Self {
        match type_name {
            "STRING" => ColumnType::String,
            "INTEGER" => ColumnType::Integer,
            "FLOAT" | "DOUBLE" => ColumnType::Float,
            "LOCAL_DATE_TIME" => ColumnType::DateTime,
            other => {
                tracing::warn!(type_name = other, "unknown column type, treating it as STRING");
                ColumnType::String
            }
        }
    }

    /// Whether range bounds on a column of this type are sent as strings.
    pub(crate) fn stringifies_bounds(self) -> bool {
        matches!(self, ColumnType::String | ColumnType::DateTime)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "STRING",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::DateTime => "DATETIME",
        };
        f.write_str(name)
    }
}

/// Sort order a column can be delivered in, or that a caller asks for.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Order {
    Ascending,
    Descending,
    None,
}

/// Predicate kinds a column accepts.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FilterKind {
    Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub column_type: ColumnType,
    pub filters: Vec<FilterKind>,
    pub order: Order,
    // remote filtering is only a hint, results must be re-checked
    pub exact: bool,
}

impl Field {
    /// Builds a field with the capabilities every remote column shares.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            filters: vec![FilterKind::Range],
            order: Order::Ascending,
            exact: false,
        }
    }

    pub fn supports_range(&self) -> bool {
        self.filters.contains(&FilterKind::Range)
    }
}

/// One element of the column listing returned by the remote API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Columns of a remote table, in the order the remote API reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSchema {
    fields: Vec<Field>,
}

impl ColumnSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Builds the schema from the remote column listing. A repeated name keeps
    /// its first position and takes the last reported type.
    pub fn from_descriptors(descriptors: &[ColumnDescriptor]) -> Self {
        let mut fields: Vec<Field> = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let field = Field::new(
                descriptor.name.clone(),
                ColumnType::from_source(&descriptor.type_name),
            );
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field,
                None => fields.push(field),
            }
        }
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.get(name).map(|f| f.column_type)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
