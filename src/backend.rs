//! Backend API client for push subscription registration.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::platform::MonitorId;

/// Encryption keys of a subscription, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Client public key.
    pub p256dh: String,
    /// Authentication secret.
    pub auth: String,
}

/// Body of `POST /monitor/{id}/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Push-service endpoint URL.
    pub endpoint: String,
    /// Encryption keys.
    pub keys: SubscriptionKeys,
}

#[derive(Serialize)]
struct UnsubscribeRequest<'a> {
    endpoint: &'a str,
}

/// JSON body of a failed API call.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VapidKeyResponse {
    public_key: String,
}

/// Operations the subscription manager needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches the server's VAPID public key (URL-safe base64).
    async fn vapid_public_key(&self) -> Result<String>;

    /// Registers a device subscription for a monitor.
    async fn register_subscription(&self, monitor_id: MonitorId, info: &SubscriptionInfo)
    -> Result<()>;

    /// Unregisters a device endpoint from a monitor.
    async fn unregister_subscription(&self, monitor_id: MonitorId, endpoint: &str) -> Result<()>;
}

/// [`Backend`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Builds a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Uses an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Passes successful responses through; turns failures into
    /// [`Error::Backend`] carrying the body's `error` text.
    async fn check_response(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            Err(_) => "Unknown error".to_string(),
        };
        log::debug!("{path} failed with {status}: {message}");
        Err(Error::Backend {
            path: path.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    /// GETs `path` and decodes the JSON body. `204 No Content` yields
    /// `T::default()`.
    pub(crate) async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.client.get(self.url(path)).send().await?;
        let response = Self::check_response(path, response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(T::default());
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn vapid_public_key(&self) -> Result<String> {
        let path = "/vapid-public-key";
        let response = self.client.get(self.url(path)).send().await?;
        let body: VapidKeyResponse = Self::check_response(path, response).await?.json().await?;
        Ok(body.public_key)
    }

    async fn register_subscription(
        &self,
        monitor_id: MonitorId,
        info: &SubscriptionInfo,
    ) -> Result<()> {
        let path = format!("/monitor/{monitor_id}/subscribe");
        let response = self.client.post(self.url(&path)).json(info).send().await?;
        Self::check_response(&path, response).await.map(drop)
    }

    async fn unregister_subscription(&self, monitor_id: MonitorId, endpoint: &str) -> Result<()> {
        let path = format!("/monitor/{monitor_id}/unsubscribe");
        let response = self
            .client
            .post(self.url(&path))
            .json(&UnsubscribeRequest { endpoint })
            .send()
            .await?;
        Self::check_response(&path, response).await.map(drop)
    }
}
