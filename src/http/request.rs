//! Request descriptor and raw response types.

use reqwest::header::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One call against the remote, fixed before it is handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Mutating calls must carry the anti-forgery token.
    pub requires_token: bool,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            requires_token: false,
        }
    }

    /// A POST with a JSON body. Requires the anti-forgery token.
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        let path = path.into();
        let body = serde_json::to_value(body).map_err(|e| Error::Decode {
            endpoint: path.clone(),
            message: format!("failed to encode request body: {}", e),
        })?;
        Ok(Self {
            method: Method::Post,
            path,
            query: Vec::new(),
            body: Some(body),
            requires_token: true,
        })
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn without_token(mut self) -> Self {
        self.requires_token = false;
        self
    }

    /// Whether re-sending the request cannot change remote state twice.
    pub fn is_idempotent(&self) -> bool {
        self.method == Method::Get
    }
}

/// A response as returned by the transport, before classification.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response with status 200. The caller decodes the body.
#[derive(Debug, Clone)]
pub struct Response {
    pub endpoint: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    /// Decodes the body, reporting the endpoint on malformed payloads.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
