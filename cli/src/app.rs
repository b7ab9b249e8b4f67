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
use clap::{Parser, Subcommand};
use cling::prelude::*;
use visapi::VisApiOptions;

/// Inspect and query tables served by a visualization API.
#[derive(Run, Parser, Clone)]
#[command(name = "visapi", version = crate::build_info::version())]
#[cling(run = "init")]
pub struct App {
    #[clap(flatten)]
    pub common_opts: crate::opts::CommonOpts,

    #[clap(subcommand)]
    pub cmd: Commands,
}

fn init(common_opts: &crate::opts::CommonOpts) -> Result<State<crate::cli_env::Env>> {
    common_opts.init_logging();

    let options = VisApiOptions::builder()
        .base_url(common_opts.base_url.clone())
        .timeout(common_opts.timeout())
        .fetch_error_policy(common_opts.fetch_error_policy())
        .discovery_method(common_opts.discovery.into())
        .build();
    tracing::debug!(base_url = options.base_url(), "using remote api");

    Ok(State(crate::cli_env::Env { options }))
}

#[derive(Run, Subcommand, Clone)]
pub enum Commands {
    /// Show the columns of a remote table
    Columns(crate::commands::columns::ColumnsCommand),
    /// Fetch rows from a remote table
    Rows(crate::commands::rows::RowsCommand),
    /// Run SQL against a remote table
    Query(crate::commands::query::QueryCommand),
    /// Show build information
    Version(crate::commands::version::VersionCommand),
}
