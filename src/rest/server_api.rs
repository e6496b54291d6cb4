//! reqwest-backed [`RestClient`].

use crate::error::TransportError;
use crate::rest::{resolve_url, RestClient, RestConnector, RestOptions, API_VERSION_HEADER};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// JSON client for the cookbook server API.
pub struct ServerApi {
    url: String,
    options: RestOptions,
    client: reqwest::Client,
}

impl ServerApi {
    pub fn new(url: impl Into<String>, options: RestOptions) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            options,
            client,
        })
    }

    fn prepare(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request
            .header("Accept", "application/json")
            .header(API_VERSION_HEADER, self.api_version().to_string());
        for (name, value) in &self.options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, TransportError> {
        let response = self.prepare(request).send().await.map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let body = response.text().await.map_err(map_reqwest_error)?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RestClient for ServerApi {
    fn url(&self) -> &str {
        &self.url
    }

    fn options(&self) -> &RestOptions {
        &self.options
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let url = resolve_url(&self.url, path);
        debug!(%url, "GET");
        self.send(self.client.get(url)).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = resolve_url(&self.url, path);
        debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = resolve_url(&self.url, path);
        debug!(%url, "PUT");
        self.send(self.client.put(url).json(body)).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let url = resolve_url(&self.url, url);
        debug!(%url, "GET file");
        let request = self.client.get(url);
        let response = self.prepare(request).send().await.map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(body.to_vec())
    }

    async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        let url = resolve_url(&self.url, url);
        debug!(%url, bytes = body.len(), "PUT file");
        let request = self
            .client
            .put(url)
            .header("Content-Type", "application/x-binary")
            .body(body);
        let response = self.prepare(request).send().await.map_err(map_reqwest_error)?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    Err(TransportError::Http {
        status: status.as_u16(),
        message: reason,
    })
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            message: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        TransportError::InvalidResponse(err.to_string())
    } else if let Some(status) = err.status() {
        TransportError::Http {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        TransportError::Connection(err.to_string())
    }
}

/// Connector producing [`ServerApi`] clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestConnector;

impl RestConnector for ReqwestConnector {
    fn connect(
        &self,
        url: &str,
        options: RestOptions,
    ) -> Result<Arc<dyn RestClient>, TransportError> {
        Ok(Arc::new(ServerApi::new(url, options)?))
    }
}
