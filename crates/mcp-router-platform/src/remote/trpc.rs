//! tRPC over HTTP.
//!
//! Queries are `GET {base}/{procedure}?input=<json>`, mutations are
//! `POST {base}/{procedure}` with a JSON body. Every call carries the
//! user's bearer token.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::PlatformError;

const ERROR_BODY_LIMIT: usize = 200;

pub struct TrpcClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TrpcClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, procedure: &str) -> String {
        format!("{}/{procedure}", self.base_url)
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        procedure: &str,
        input: &Value,
    ) -> Result<T, PlatformError> {
        debug!(procedure, "tRPC query");
        let mut request = self.http.get(self.url(procedure)).bearer_auth(&self.token);
        if !input.is_null() {
            let encoded =
                serde_json::to_string(input).map_err(|e| PlatformError::Decode(e.to_string()))?;
            request = request.query(&[("input", encoded)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Self::finish(response).await
    }

    pub async fn mutate<T: DeserializeOwned>(
        &self,
        procedure: &str,
        input: &Value,
    ) -> Result<T, PlatformError> {
        debug!(procedure, "tRPC mutation");
        let response = self
            .http
            .post(self.url(procedure))
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;
        Self::finish(response).await
    }

    async fn finish<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PlatformError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PlatformError::Auth(
                "remote workspace rejected the user token".into(),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| error_message(&v))
                .unwrap_or(text);
            return Err(PlatformError::Http {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        serde_json::from_value(unwrap_response(json))
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }
}

fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .get("message")
        .or_else(|| error.get("json").and_then(|j| j.get("message")))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Payload of a tRPC response: `result.data.json`, then `data.json`, then
/// `json`, then the body itself.
pub fn unwrap_response(body: Value) -> Value {
    const PATHS: [&[&str]; 3] = [&["result", "data", "json"], &["data", "json"], &["json"]];
    for path in PATHS {
        if let Some(inner) = path.iter().try_fold(&body, |v, key| v.get(*key)) {
            return inner.clone();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::test_server::{serve, Reply};
    use serde_json::json;

    #[test]
    fn unwraps_known_envelopes() {
        assert_eq!(
            unwrap_response(json!({"result": {"data": {"json": [1, 2]}}})),
            json!([1, 2])
        );
        assert_eq!(unwrap_response(json!({"data": {"json": {"a": 1}}})), json!({"a": 1}));
        assert_eq!(unwrap_response(json!({"json": true})), json!(true));
        assert_eq!(unwrap_response(json!({"id": "s1"})), json!({"id": "s1"}));
        assert_eq!(unwrap_response(json!([1])), json!([1]));
        assert_eq!(unwrap_response(json!("plain")), json!("plain"));
    }

    #[test]
    fn base_url_is_trimmed() {
        let client = TrpcClient::new("https://api.example.com/trpc/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/trpc");
        assert_eq!(client.url("servers.list"), "https://api.example.com/trpc/servers.list");
    }

    #[tokio::test]
    async fn query_sends_input_and_token() {
        let (url, server) = serve(vec![Reply::ok(json!({"result": {"data": {"json": {"n": 3}}}}))]).await;
        let client = TrpcClient::new(url, "secret", Duration::from_secs(5)).unwrap();
        let value: Value = client.query("servers.get", &json!({"id": "s1"})).await.unwrap();
        assert_eq!(value, json!({"n": 3}));

        let requests = server.await.unwrap();
        let first = &requests[0];
        assert!(first.starts_with("GET /servers.get?input="));
        assert!(first.contains("%22s1%22"));
        assert!(first.to_lowercase().contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn mutate_posts_json_body() {
        let (url, server) = serve(vec![Reply::ok(json!({"json": true}))]).await;
        let client = TrpcClient::new(url, "secret", Duration::from_secs(5)).unwrap();
        let started: bool = client.mutate("servers.start", &json!({"id": "s1"})).await.unwrap();
        assert!(started);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /servers.start "));
        assert!(requests[0].ends_with(r#"{"id":"s1"}"#));
    }

    #[tokio::test]
    async fn error_statuses() {
        let (url, _server) = serve(vec![
            Reply::status(401, json!({})),
            Reply::status(500, json!({"error": {"message": "database offline"}})),
        ])
        .await;
        let client = TrpcClient::new(url, "secret", Duration::from_secs(5)).unwrap();

        let err = client.query::<Value>("servers.list", &Value::Null).await.unwrap_err();
        assert!(matches!(err, PlatformError::Auth(_)));

        let err = client.query::<Value>("servers.list", &Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: database offline");
    }
}
