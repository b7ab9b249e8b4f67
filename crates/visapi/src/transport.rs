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

//! HTTP access to the remote API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::errors::{AdapterError, Result};

/// Status code and raw body of a remote response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// The requests the adapter issues. Implementations only report transport
/// failures as errors; any HTTP status is returned as a response.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn get(&self, url: &Url) -> Result<HttpResponse>;

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Http {
                endpoint: String::new(),
                reason: format!("could not build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn send(&self, url: &Url, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let http_error = |e: reqwest::Error| AdapterError::Http {
            endpoint: url.to_string(),
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
        };

        let response = request.send().await.map_err(http_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(http_error)?;
        tracing::trace!(%url, status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        self.send(url, self.client.get(url.clone())).await
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<HttpResponse> {
        self.send(url, self.client.post(url.clone()).json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_json_sends_body_and_returns_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data/t"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"x": 1})))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/data/t", mock_server.uri())).unwrap();
        let response = transport
            .post_json(&url, &serde_json::json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(response, HttpResponse::new(503, "busy"));
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_with_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let transport = HttpTransport::new(Duration::from_millis(50)).unwrap();
        let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
        let err = transport.get(&url).await.unwrap_err();

        assert_eq!(
            err,
            AdapterError::Http {
                endpoint: url.to_string(),
                reason: "request timed out".to_string(),
            }
        );
    }
}
