//! The single network seam: one HTTP round trip, no retries, no state.
//!
//! Cookies and default headers live in the session and are attached by the
//! executor before a request reaches the transport.

use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};

use super::request::{Method, RawResponse};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// A fully prepared request: absolute URL, merged headers, encoded body.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one round trip. Any HTTP status is a successful round trip;
    /// only failures before a status is obtained are errors.
    async fn send(&self, request: Outgoing) -> Result<RawResponse>;
}

/// Transport backed by a reqwest `Client`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the underlying client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    async fn send(&self, request: Outgoing) -> Result<RawResponse> {
        let endpoint = request.url.path().to_string();
        let builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };
        let mut builder = builder.headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| transport_error(&endpoint, e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&endpoint, e))?
            .to_vec();

        debug!("{} answered {} ({} bytes)", endpoint, status, body.len());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(endpoint: &str, error: reqwest::Error) -> Error {
    Error::Transport {
        endpoint: endpoint.to_string(),
        timeout: error.is_timeout(),
        message: error.to_string(),
    }
}
