//! Browser-like session state: cookie jar, default headers, anti-forgery token.
//!
//! A `Session` is replaced wholesale when the remote session is expired and
//! mutated in place when a store reset hands out a new token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{CONTENT_TYPE, COOKIE, HOST, HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Cookie the remote sets on a store reset.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Header that must echo the cookie on later requests.
pub const XSRF_HEADER: HeaderName = HeaderName::from_static("x-xsrf-token");

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug)]
pub struct Session {
    base_url: Url,
    jar: Arc<Jar>,
    headers: HeaderMap,
    token: Option<String>,
    created_at: Instant,
}

impl Session {
    /// A fresh session: empty jar, default headers, no token.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.url()?;
        let host = config.host()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(
            HOST,
            HeaderValue::from_str(&host).map_err(|e| Error::InvalidUrl(format!("{}: {}", host, e)))?,
        );

        Ok(Self {
            base_url,
            jar: Arc::new(Jar::default()),
            headers,
            token: None,
            created_at: Instant::now(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Default headers, including the token header once set.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Mirrors `token` into the header, replacing any earlier value.
    pub fn set_token(&mut self, token: &str) -> Result<()> {
        let mut value = HeaderValue::from_str(token)
            .map_err(|e| Error::Session(format!("{} cookie is not a valid header value: {}", XSRF_COOKIE, e)))?;
        value.set_sensitive(true);
        self.headers.insert(XSRF_HEADER, value);
        self.token = Some(token.to_string());
        Ok(())
    }

    /// Value of a cookie currently held for the remote.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    /// Stores every `Set-Cookie` of a response.
    ///
    /// Cookies are recorded against the site root so they are sent on every
    /// endpoint, whatever path set them.
    pub fn store_cookies(&self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(cookie) = value.to_str() {
                self.jar.add_cookie_str(cookie, &self.base_url);
            }
        }
    }

    /// Headers for one outgoing request: defaults plus the current cookies.
    pub fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(cookies) = self.jar.cookies(&self.base_url) {
            headers.insert(COOKIE, cookies);
        }
        headers
    }

    /// Resolves an endpoint path against the base URL.
    pub fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Value the `Set-Cookie` headers of one response assign to `name`.
///
/// The last assignment wins, as it would in a browser. An empty value
/// deletes the cookie and counts as absent.
pub fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
        .last()
        .filter(|value| !value.is_empty())
}

/// Shortens a token for log output.
pub(crate) fn mask(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}*********", prefix)
}
