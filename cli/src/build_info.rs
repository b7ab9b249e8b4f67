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

//! Build information

use std::sync::OnceLock;

/// Version of the visapi CLI, same as `package.version` in `Cargo.toml`.
pub const VISAPI_CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Date of the build, for example `2025-04-30`.
pub const VISAPI_CLI_BUILD_DATE: &str = env!("VERGEN_BUILD_DATE");
/// Time of the build, for example `2025-04-30T02:08:48.979612094Z`.
pub const VISAPI_CLI_BUILD_TIME: &str = env!("VERGEN_BUILD_TIMESTAMP");
/// Short commit SHA of the build, for example `00c4dd4`.
pub const VISAPI_CLI_COMMIT_SHA: &str = env!("VERGEN_GIT_SHA");
pub const VISAPI_CLI_COMMIT_DATE: &str = env!("VERGEN_GIT_COMMIT_DATE");
pub const VISAPI_CLI_BRANCH: &str = env!("VERGEN_GIT_BRANCH");

/// Target of the build, for example `aarch64-unknown-linux-gnu`.
pub const VISAPI_CLI_TARGET_TRIPLE: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");
/// Features selected at build time, comma separated.
pub const VISAPI_CLI_BUILD_FEATURES: &str = env!("VERGEN_CARGO_FEATURES");

/// Set to `"true"` when the binary was stripped with `objcopy --strip-debug`.
const VISAPI_CLI_DEBUG_STRIPPED: Option<&str> = option_env!("DEBUG_STRIPPED");

const VISAPI_CLI_DEBUG: &str = env!("VERGEN_CARGO_DEBUG");

fn is_debug() -> bool {
    VISAPI_CLI_DEBUG == "true" && VISAPI_CLI_DEBUG_STRIPPED != Some("true")
}

fn build_info() -> String {
    format!(
        "{VISAPI_CLI_VERSION}{} ({VISAPI_CLI_COMMIT_SHA} {VISAPI_CLI_TARGET_TRIPLE} {VISAPI_CLI_BUILD_DATE})",
        if is_debug() { " (debug)" } else { "" }
    )
}

static VERSION: OnceLock<String> = OnceLock::new();

pub fn version() -> &'static str {
    VERSION.get_or_init(build_info)
}

pub fn details() -> Vec<(&'static str, &'static str)> {
    vec![
        ("version", VISAPI_CLI_VERSION),
        ("build-time", VISAPI_CLI_BUILD_TIME),
        ("commit", VISAPI_CLI_COMMIT_SHA),
        ("commit-date", VISAPI_CLI_COMMIT_DATE),
        ("branch", VISAPI_CLI_BRANCH),
        ("target", VISAPI_CLI_TARGET_TRIPLE),
        ("features", VISAPI_CLI_BUILD_FEATURES),
        ("debug", if is_debug() { "true" } else { "false" }),
    ]
}
