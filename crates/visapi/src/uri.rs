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

//! Connection URIs understood by the visualization API adapter.
//!
//! A URI targets the adapter when its host is [`RECOGNIZED_HOST`] and its query
//! string names a table, for example `https://api.visapi.com/?table=sensors`.

use url::Url;

use crate::errors::{AdapterError, Result};

/// Host that marks a connection URI as belonging to the visualization API.
pub const RECOGNIZED_HOST: &str = "api.visapi.com";

/// Query parameter that carries the remote table name.
pub const TABLE_PARAM: &str = "table";

/// Returns the first non-blank value of `key` in the query string. Blank
/// values are treated as absent.
fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

/// Whether the authority written in `uri` carries a port. `Url` drops default
/// ports such as `:443`, so the raw text is checked as well.
fn has_explicit_port(uri: &str) -> bool {
    let Some((_, rest)) = uri.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host_port.contains(':')
}

fn is_recognized_authority(url: &Url, uri: &str) -> bool {
    url.host_str() == Some(RECOGNIZED_HOST)
        && url.port().is_none()
        && !has_explicit_port(uri)
        && url.username().is_empty()
        && url.password().is_none()
}

/// Reports whether `uri` targets this adapter. Never fails: anything that does
/// not parse as a URL is simply not supported.
pub fn supports(uri: &str) -> bool {
    match Url::parse(uri) {
        Ok(url) => is_recognized_authority(&url, uri) && query_value(&url, TABLE_PARAM).is_some(),
        Err(_) => false,
    }
}

/// Extracts the table name from a connection URI.
pub fn parse_uri(uri: &str) -> Result<String> {
    let url = Url::parse(uri).map_err(|e| AdapterError::MalformedUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    query_value(&url, TABLE_PARAM).ok_or_else(|| AdapterError::MalformedUri {
        uri: uri.to_string(),
        reason: format!("missing `{TABLE_PARAM}` query parameter"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        let cases = [
            ("https://api.visapi.com/?table=sensors", true),
            ("https://api.visapi.com?table=sensors&other=1", true),
            ("visapi://api.visapi.com/?table=a&table=b", true),
            ("https://api.visapi.com/?other=sensors", false),
            ("https://api.visapi.com/?table=", false),
            ("https://api.visapi.com/", false),
            ("https://api.visapi.com:8080/?table=sensors", false),
            ("https://api.visapi.com:443/?table=sensors", false),
            ("http://api.visapi.com:80?table=sensors", false),
            ("https://api.visapi.com:/?table=sensors", false),
            ("https://api.visapi.com/?table=sensors&at=10:00", true),
            ("https://user@api.visapi.com/?table=sensors", false),
            ("https://example.com/?table=sensors", false),
            ("https://api.visapi.com.example.com/?table=sensors", false),
            ("api.visapi.com?table=sensors", false),
            ("", false),
        ];

        for (uri, expect) in cases {
            assert_eq!(supports(uri), expect, "supports({uri:?})");
        }
    }

    #[test]
    fn test_parse_uri() {
        assert_eq!(
            parse_uri("https://api.visapi.com/?table=sensors").unwrap(),
            "sensors"
        );
        assert_eq!(
            parse_uri("https://api.visapi.com/?table=a&table=b").unwrap(),
            "a"
        );
        assert_eq!(
            parse_uri("https://api.visapi.com/?table=my%20table").unwrap(),
            "my table"
        );
    }

    #[test]
    fn test_parse_uri_agrees_with_supports() {
        for uri in [
            "https://api.visapi.com/?table=sensors",
            "https://api.visapi.com/path?x=1&table=t1",
            "visapi://api.visapi.com?table=%C3%A9t%C3%A9",
        ] {
            assert!(supports(uri));
            let table = parse_uri(uri).unwrap();
            let expect = Url::parse(uri)
                .unwrap()
                .query_pairs()
                .find(|(k, _)| k == TABLE_PARAM)
                .map(|(_, v)| v.into_owned())
                .unwrap();
            assert_eq!(table, expect);
        }
    }

    #[test]
    fn test_parse_uri_missing_table() {
        let result = parse_uri("https://api.visapi.com/?other=1");
        assert_eq!(
            result.unwrap_err(),
            AdapterError::MalformedUri {
                uri: "https://api.visapi.com/?other=1".to_string(),
                reason: "missing `table` query parameter".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_uri_unparsable() {
        let result = parse_uri("not a uri");
        assert!(matches!(result, Err(AdapterError::MalformedUri { .. })));
    }
}
