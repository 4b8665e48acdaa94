// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! REST client for the S2 append endpoint.
//!
//! Each append is one `POST {endpoint}/v1/streams/{stream}/records` with a
//! single base64-encoded record:
//!
//! ```text
//! {"records":[{"body":"<base64>"}]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::basin::stream_cache::StreamCache;
use crate::basin::BasinClient;
use crate::config::Config;
use crate::credentials::AccessToken;
use crate::error::{ConfigError, DispatchError};
use crate::router::StreamName;

const BASIN_HEADER: &str = "s2-basin";
const FORMAT_HEADER: &str = "s2-format";

#[derive(Serialize)]
struct AppendInput<'a> {
    records: [AppendRecord<'a>; 1],
}

#[derive(Serialize)]
struct AppendRecord<'a> {
    body: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpBasinClient {
    client: reqwest::Client,
    streams: StreamCache,
}

impl HttpBasinClient {
    pub fn new(config: &Config, token: &AccessToken) -> Result<Self, ConfigError> {
        let endpoint = config.basin_endpoint();
        let base = Url::parse(&endpoint)
            .map_err(|e| ConfigError::Invalid(format!("invalid endpoint '{endpoint}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{endpoint}' cannot be used as a base URL"
            )));
        }

        let headers = default_headers(config.basin_name.trim(), token)?;
        let client = build_client(headers, config.timeout)
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            streams: StreamCache::from_config(base, &config.stream_cache),
        })
    }
}

fn default_headers(basin: &str, token: &AccessToken) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
        .map_err(|_| ConfigError::Invalid("access token is not a valid header value".into()))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(
        BASIN_HEADER,
        HeaderValue::from_str(basin)
            .map_err(|_| ConfigError::Invalid(format!("invalid basin name '{basin}'")))?,
    );
    headers.insert(FORMAT_HEADER, HeaderValue::from_static("base64"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn build_client(headers: HeaderMap, timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .build()
}

#[async_trait]
impl BasinClient for HttpBasinClient {
    async fn append(&self, stream: &StreamName, body: &[u8]) -> Result<(), DispatchError> {
        let handle = self.streams.get_or_create(stream)?;

        let encoded = BASE64_STANDARD.encode(body);
        let input = AppendInput {
            records: [AppendRecord { body: &encoded }],
        };

        let response = self
            .client
            .post(handle.append_url.clone())
            .json(&input)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        debug!(stream = %stream, status = %status, "Append rejected by basin");
        Err(DispatchError::Rejected { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use reqwest::StatusCode;

    fn config_for(server: &Server) -> Config {
        Config {
            basin_name: "my-logs".to_string(),
            endpoint: Some(server.url()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_append_sends_single_base64_record() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/streams/otel-api-2024-01-15-10/records")
            .match_header("authorization", "Bearer secret")
            .match_header("s2-basin", "my-logs")
            .match_header("s2-format", "base64")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "records": [{ "body": "aGVsbG8=" }]
            })))
            .with_status(200)
            .with_body(r#"{"start":{"seq_num":0}}"#)
            .create_async()
            .await;

        let client = HttpBasinClient::new(&config_for(&server), &AccessToken::new("secret"))
            .expect("client");
        client
            .append(&StreamName::from("otel-api-2024-01-15-10"), b"hello")
            .await
            .expect("append");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/streams/s/records")
            .with_status(503)
            .with_body("slow down")
            .create_async()
            .await;

        let client = HttpBasinClient::new(&config_for(&server), &AccessToken::new("secret"))
            .expect("client");
        let result = client.append(&StreamName::from("s"), b"x").await;

        match result {
            Err(DispatchError::Rejected { status, message }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = Config {
            basin_name: "my-logs".to_string(),
            endpoint: Some("http://127.0.0.1:1".to_string()),
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let client = HttpBasinClient::new(&config, &AccessToken::new("secret")).expect("client");
        let result = client.append(&StreamName::from("s"), b"x").await;
        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let config = Config {
            basin_name: "my-logs".to_string(),
            endpoint: Some("http://[::1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            HttpBasinClient::new(&config, &AccessToken::new("secret")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_token_with_newline_is_config_error() {
        let config = Config {
            basin_name: "my-logs".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpBasinClient::new(&config, &AccessToken::new("bad\ntoken")),
            Err(ConfigError::Invalid(_))
        ));
    }
}
