//! Requests, responses, and the network the worker falls through to.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, Url};

use crate::error::{Error, Result};

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    /// Parses `url` into a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` is not absolute.
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Key under which the response to this request is cached.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// A response body with its status and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Bytes,
}

impl Response {
    /// A `200 OK` response with the given body.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_status(200, body)
    }

    /// A response with an arbitrary status.
    #[must_use]
    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Whether the status is a real HTTP status code.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (100..=599).contains(&self.status)
    }

    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Live network access.
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs `request` against the network.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// [`Network`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
