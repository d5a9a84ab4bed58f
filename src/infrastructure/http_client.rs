//! JSON-over-HTTP client shared by the model and vector index adapters

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn get_json(&self, url: &str, headers: Vec<(&str, &str)>)
        -> Result<Value, DomainError>;

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client whose every request is bounded by `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, DomainError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DomainError::provider("http", format!("Request timed out: {}", e))
            } else {
                DomainError::provider("http", format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                "http",
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::provider("http", format!("Failed to parse response: {}", e)))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<Value, DomainError> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.send(request).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, DomainError> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.send(request.json(body)).await
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// Canned responses keyed by URL, shared by GET and POST
    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        responses: RwLock<HashMap<String, Value>>,
        errors: RwLock<HashMap<String, String>>,
        bodies: RwLock<Vec<(String, Value)>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, url: impl Into<String>, response: Value) -> Self {
            self.responses.write().unwrap().insert(url.into(), response);
            self
        }

        pub fn with_error(self, url: impl Into<String>, error: impl Into<String>) -> Self {
            self.errors.write().unwrap().insert(url.into(), error.into());
            self
        }

        /// Bodies of every POST received, in order
        pub fn posted_bodies(&self) -> Vec<(String, Value)> {
            self.bodies.read().unwrap().clone()
        }

        fn lookup(&self, url: &str) -> Result<Value, DomainError> {
            if let Some(error) = self.errors.read().unwrap().get(url) {
                return Err(DomainError::provider("mock", error));
            }

            self.responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| DomainError::provider("mock", format!("No mock response for {}", url)))
        }
    }

    #[async_trait]
    impl HttpClientTrait for MockHttpClient {
        async fn get_json(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
        ) -> Result<Value, DomainError> {
            self.lookup(url)
        }

        async fn post_json(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
            body: &Value,
        ) -> Result<Value, DomainError> {
            self.bodies
                .write()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.lookup(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_post_json_sends_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("Authorization", "Bearer key"))
            .and(body_json(serde_json::json!({"q": "cache"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let value = client
            .post_json(
                &format!("{}/echo", server.uri()),
                vec![("Authorization", "Bearer key")],
                &serde_json::json!({"q": "cache"}),
            )
            .await
            .unwrap();

        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c1"})))
            .mount(&server)
            .await;

        let value = HttpClient::new()
            .get_json(&format!("{}/item", server.uri()), vec![])
            .await
            .unwrap();

        assert_eq!(value["id"], "c1");
    }

    #[tokio::test]
    async fn test_error_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .get_json(&server.uri(), vec![])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::with_timeout(Duration::from_millis(50)).unwrap();
        let err = client.get_json(&server.uri(), vec![]).await.unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }
}
