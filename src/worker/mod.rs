//! Offline cache worker.
//!
//! [`OfflineWorker`] precaches one release's static assets into a versioned
//! bucket, purges older buckets on activation, answers intercepted GET
//! requests cache-first for assets and network-first for everything else,
//! and turns push messages into tagged notifications.

mod cache;
mod event;
mod manifest;
mod network;
mod notification;
mod scope;

use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::{Method, Url};

pub use cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use event::ExtendableEvent;
pub use manifest::{AssetManifest, CACHE_PREFIX};
pub use network::{HttpNetwork, Network, Request, Response};
pub use notification::{
    DEFAULT_BODY, DEFAULT_TITLE, DEFAULT_URL, NOTIFICATION_ICON, Notification, NotificationAction,
    NotificationCenter, NotificationData, NotificationOptions, PushPayload, monitor_tag,
};
pub use scope::{HeadlessScope, WorkerScope};

use crate::error::{Error, Result};

/// What the worker decided for an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    /// Answered by the worker.
    Respond(Response),
}

/// Background worker serving one release's assets offline.
pub struct OfflineWorker<C: CacheStorage, N: Network, W: WorkerScope> {
    cache: C,
    network: N,
    scope: W,
    manifest: AssetManifest,
    origin: Url,
    cache_name: String,
    precache_concurrency: usize,
}

impl<C: CacheStorage, N: Network, W: WorkerScope> OfflineWorker<C, N, W> {
    /// Creates a worker for `manifest`, with asset paths resolved against `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `origin` is not an absolute URL.
    pub fn new(cache: C, network: N, scope: W, manifest: AssetManifest, origin: &str) -> Result<Self> {
        let origin = Url::parse(origin).map_err(|e| Error::InvalidUrl(format!("{origin}: {e}")))?;
        let cache_name = manifest.cache_name();
        Ok(Self {
            cache,
            network,
            scope,
            manifest,
            origin,
            cache_name,
            precache_concurrency: 8,
        })
    }

    /// Sets how many assets are fetched at once during install.
    #[must_use]
    pub fn with_precache_concurrency(mut self, concurrency: usize) -> Self {
        self.precache_concurrency = concurrency.max(1);
        self
    }

    /// The cache storage.
    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    /// The host scope.
    #[must_use]
    pub const fn scope(&self) -> &W {
        &self.scope
    }

    /// The release manifest.
    #[must_use]
    pub const fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    /// Name of the current bucket, `cache-<version>`.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn asset_request(&self, path: &str) -> Result<Request> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        Ok(Request::new(Method::GET, url))
    }

    async fn fetch_asset(&self, path: &str) -> Result<(Request, Response)> {
        let request = self.asset_request(path)?;
        let response = self.network.fetch(&request).await?;
        if !(200..300).contains(&response.status) {
            return Err(Error::Cache(format!(
                "precaching {path} failed: HTTP {}",
                response.status
            )));
        }
        Ok((request, response))
    }

    /// Precaches every manifest asset into the current bucket.
    ///
    /// Nothing is stored, and the bucket is not created, unless every asset
    /// was fetched successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if any asset cannot be fetched or stored.
    pub async fn install(&self) -> Result<usize> {
        let fetched: Vec<Result<(Request, Response)>> =
            stream::iter(self.manifest.files.iter().cloned())
                .map(|path| async move { self.fetch_asset(&path).await })
                .buffer_unordered(self.precache_concurrency)
                .collect()
                .await;
        let entries = fetched.into_iter().collect::<Result<Vec<_>>>()?;

        self.cache.open(&self.cache_name).await?;
        for (request, response) in &entries {
            self.cache
                .put(&self.cache_name, request.cache_key(), response)
                .await?;
        }
        log::info!("Precached {} assets into {}", entries.len(), self.cache_name);
        Ok(entries.len())
    }

    /// Deletes every bucket but the current one, then claims open pages.
    ///
    /// Returns the names of the deleted buckets.
    ///
    /// # Errors
    ///
    /// Returns an error if buckets cannot be listed or deleted.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut purged = Vec::new();
        for name in self.cache.keys().await? {
            if name != self.cache_name && self.cache.delete(&name).await? {
                log::info!("Deleted stale cache {name}");
                purged.push(name);
            }
        }
        self.scope.claim_clients().await?;
        Ok(purged)
    }

    /// Answers an intercepted request.
    ///
    /// # Errors
    ///
    /// Returns the original network error when the network fails and no
    /// cached copy of the request exists.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        if request.method != Method::GET {
            return Ok(FetchOutcome::Passthrough);
        }
        // Extension pages and other pseudo-protocols are not ours to cache.
        if !matches!(request.url.scheme(), "http" | "https") {
            log::debug!("Ignoring {} request", request.url.scheme());
            return Ok(FetchOutcome::Passthrough);
        }

        let path = request.url.path();
        if self.manifest.contains(path) {
            let key = self.asset_request(path)?;
            match self.cache.lookup(&self.cache_name, key.cache_key()).await {
                Ok(Some(cached)) => return Ok(FetchOutcome::Respond(cached)),
                Ok(None) => log::debug!("Asset {path} missing from {}", self.cache_name),
                Err(e) => log::warn!("Cache lookup for {path} failed: {e}"),
            }
        }

        let fetched = match self.network.fetch(request).await {
            Ok(response) if response.is_valid() => Ok(response),
            Ok(_) => Err(Error::InvalidResponse),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(response) => {
                if response.status == 200 {
                    if let Err(e) = self
                        .cache
                        .put(&self.cache_name, request.cache_key(), &response)
                        .await
                    {
                        log::warn!("Failed to cache {}: {e}", request.url);
                    }
                }
                Ok(FetchOutcome::Respond(response))
            }
            Err(err) => match self.cache.lookup(&self.cache_name, request.cache_key()).await {
                Ok(Some(cached)) => {
                    log::debug!("Serving {} from cache: {err}", request.url);
                    Ok(FetchOutcome::Respond(cached))
                }
                Ok(None) => Err(err),
                Err(cache_err) => {
                    log::warn!("Cache lookup for {} failed: {cache_err}", request.url);
                    Err(err)
                }
            },
        }
    }

    /// Shows the notification for a push message.
    ///
    /// Returns `None` when the message carries no data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] for malformed payloads, or the scope's
    /// error if the notification cannot be shown.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Result<Option<Notification>> {
        let Some(notification) = render_push(data)? else {
            return Ok(None);
        };
        self.scope.show_notification(notification.clone()).await?;
        Ok(Some(notification))
    }

    /// Dismisses `notification` and opens its target for "view" or body clicks.
    ///
    /// # Errors
    ///
    /// Returns the scope's error if closing or opening fails.
    pub async fn handle_notification_click(
        &self,
        notification: &Notification,
        action: Option<&str>,
    ) -> Result<()> {
        self.scope.close_notification(&notification.options.tag).await?;
        if let Some(url) = notification.click_target(action) {
            self.scope.open_window(url).await?;
        }
        Ok(())
    }
}

impl<C, N, W> OfflineWorker<C, N, W>
where
    C: CacheStorage + 'static,
    N: Network + 'static,
    W: WorkerScope + 'static,
{
    /// Install event: skip waiting and precache under `event`.
    ///
    /// A failed precache fails the event; the host must not activate.
    pub fn on_install(self: &Arc<Self>, event: &ExtendableEvent) {
        self.scope.skip_waiting();
        let worker = Arc::clone(self);
        event.wait_until(async move {
            worker.install().await.map(drop).inspect_err(|e| {
                log::error!("Install of {} failed: {e}", worker.cache_name);
            })
        });
    }

    /// Activate event: purge stale buckets under `event`.
    pub fn on_activate(self: &Arc<Self>, event: &ExtendableEvent) {
        let worker = Arc::clone(self);
        event.wait_until(async move {
            worker.activate().await.map(drop).inspect_err(|e| {
                log::error!("Activation of {} failed: {e}", worker.cache_name);
            })
        });
    }

    /// Push event: render the payload and show it under `event`.
    ///
    /// Empty and malformed messages are logged and dropped.
    pub fn on_push(self: &Arc<Self>, event: &ExtendableEvent, data: Option<Bytes>) {
        let notification = match render_push(data.as_deref()) {
            Ok(Some(notification)) => notification,
            Ok(None) => return,
            Err(e) => {
                log::error!("Error handling push event: {e}");
                return;
            }
        };
        let worker = Arc::clone(self);
        event.wait_until(async move {
            worker
                .scope
                .show_notification(notification)
                .await
                .inspect_err(|e| log::error!("Failed to show notification: {e}"))
        });
    }

    /// Notification click event.
    pub fn on_notification_click(
        self: &Arc<Self>,
        event: &ExtendableEvent,
        notification: Notification,
        action: Option<String>,
    ) {
        let worker = Arc::clone(self);
        event.wait_until(async move {
            worker
                .handle_notification_click(&notification, action.as_deref())
                .await
                .inspect_err(|e| log::error!("Failed to handle notification click: {e}"))
        });
    }
}

fn render_push(data: Option<&[u8]>) -> Result<Option<Notification>> {
    let Some(data) = data else {
        log::debug!("Push event has no data");
        return Ok(None);
    };
    Ok(Some(PushPayload::parse(data)?.into_notification()))
}
