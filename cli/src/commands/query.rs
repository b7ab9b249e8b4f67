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
use cling::prelude::*;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::pretty::print_batches;
use visapi::query::QueryEngine;

/// `QueryCommand` registers one remote table and runs a SQL statement
/// against it.
#[derive(Run, Parser, Clone, Collect, Debug)]
#[cling(run = "run")]
pub struct QueryCommand {
    /// Connection URI, e.g. `https://api.visapi.com/?table=sensors`.
    #[clap(long)]
    uri: String,
    /// Name the table is registered under.
    #[clap(long, default_value = "visapi")]
    name: String,
    /// The SQL query to execute.
    #[clap(verbatim_doc_comment)]
    sql: String,
}

async fn run(env: State<crate::cli_env::Env>, me: &QueryCommand) -> Result<()> {
    let engine = QueryEngine::with_options(env.0.options.clone());
    engine.register_uri(&me.name, &me.uri).await?;

    let df = engine.context().sql(&me.sql).await?;
    let results: Vec<RecordBatch> = df.collect().await?;
    print_batches(results.as_slice())?;

    Ok(())
}
