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

use std::time::Duration;

use clap::{Args, ValueEnum};
use clap_verbosity_flag::{LogLevel, VerbosityFilter};
use cling::prelude::*;
use visapi::{DiscoveryMethod, FetchErrorPolicy, DEFAULT_BASE_URL};

#[derive(Args, Collect, Clone)]
pub struct CommonOpts {
    #[clap(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity<Quiet>,

    /// Base URL of the visualization API.
    #[arg(long, env = "VISAPI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub(crate) base_url: String,

    /// Request timeout in seconds.
    #[arg(long, env = "VISAPI_TIMEOUT", default_value_t = 30, global = true)]
    pub(crate) timeout: u64,

    /// Treat failed row requests as empty results instead of errors.
    #[arg(long, global = true)]
    pub(crate) lenient: bool,

    /// HTTP method used to list a table's columns.
    #[arg(long, value_enum, default_value_t = Discovery::Get, global = true)]
    pub(crate) discovery: Discovery,
}

impl CommonOpts {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub(crate) fn fetch_error_policy(&self) -> FetchErrorPolicy {
        if self.lenient {
            FetchErrorPolicy::Empty
        } else {
            FetchErrorPolicy::Strict
        }
    }

    /// Installs a stderr subscriber at the level picked by `-v`/`-q`.
    pub(crate) fn init_logging(&self) {
        let level = match self.verbose.filter() {
            VerbosityFilter::Off => return,
            VerbosityFilter::Error => tracing::Level::ERROR,
            VerbosityFilter::Warn => tracing::Level::WARN,
            VerbosityFilter::Info => tracing::Level::INFO,
            VerbosityFilter::Debug => tracing::Level::DEBUG,
            VerbosityFilter::Trace => tracing::Level::TRACE,
        };
        // a subscriber may already be set when embedded
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum Discovery {
    #[default]
    Get,
    Post,
}

impl From<Discovery> for DiscoveryMethod {
    fn from(value: Discovery) -> Self {
        match value {
            Discovery::Get => DiscoveryMethod::Get,
            Discovery::Post => DiscoveryMethod::Post,
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct Quiet;
impl LogLevel for Quiet {
    fn default_filter() -> VerbosityFilter {
        VerbosityFilter::Error
    }

    fn verbose_long_help() -> Option<&'static str> {
        None
    }

    fn quiet_help() -> Option<&'static str> {
        None
    }

    fn quiet_long_help() -> Option<&'static str> {
        None
    }
}
