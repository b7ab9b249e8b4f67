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

use anyhow::Result;
use clap::Parser;
use cling::prelude::*;
use comfy_table::presets::NOTHING;
use comfy_table::Table;
use visapi::{Adapter, ColumnSchema, VisualizationApi};

/// Command to print the columns a remote table exposes.
#[derive(Run, Parser, Collect, Clone, Debug)]
#[cling(run = "run_columns")]
pub struct ColumnsCommand {
    /// Connection URI, e.g. `https://api.visapi.com/?table=sensors`.
    #[clap(long)]
    pub uri: String,
}

pub async fn run_columns(state: State<crate::cli_env::Env>, args: &ColumnsCommand) -> Result<()> {
    let adapter = VisualizationApi::from_uri(&args.uri, state.0.options.clone())?;
    let schema = adapter.get_columns().await?;
    println!("{}", columns_table(&schema));
    Ok(())
}

fn columns_table(schema: &ColumnSchema) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.load_preset(NOTHING);
    table.set_header(vec!["NAME", "TYPE", "FILTERS", "ORDER", "EXACT"]);

    for field in schema.fields() {
        table.add_row(vec![
            field.name.clone(),
            field.column_type.to_string(),
            field
                .filters
                .iter()
                .map(|f| format!("{f:?}").to_lowercase())
                .collect::<Vec<_>>()
                .join(","),
            format!("{:?}", field.order).to_lowercase(),
            field.exact.to_string(),
        ]);
    }
    table
}
