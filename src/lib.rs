//! uptime-push - push alert subscriptions and offline caching for an
//! uptime-monitoring dashboard.
//!
//! The library has two halves:
//!
//! - [`SubscriptionManager`] subscribes this installation to push alerts for
//!   individual monitors, registering the device with the backend and
//!   remembering which monitors were chosen.
//! - [`worker::OfflineWorker`] keeps one release's static assets in a
//!   versioned cache, serves requests offline, and renders push messages as
//!   notifications.
//!
//! [`HttpBackend`] also reads the dashboard's data (see [`dashboard`]).
//!
//! Host primitives (push service, permission prompts, local storage, cache
//! buckets, the network) sit behind traits so any host can drive the logic.
//!
//! # Example
//!
//! ```no_run
//! use uptime_push::{AppConfig, FileStorage, HttpBackend, Platform, SubscriptionManager};
//!
//! # async fn example(platform: impl Platform) -> uptime_push::Result<()> {
//! let config = AppConfig::load_or_default()?;
//! let backend = HttpBackend::new(&config.backend)?;
//! let storage = FileStorage::new(&config.push.storage_path);
//!
//! let mut manager = SubscriptionManager::new(platform, backend, storage, config.push);
//! if manager.check_support().await {
//!     match manager.subscribe_to_monitor(42).await {
//!         Ok(()) => println!("subscribed to {:?}", manager.subscribed_monitor_ids()),
//!         Err(e) => eprintln!("subscribe failed: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod backend;
pub mod config;
pub mod dashboard;
pub mod encoding;
pub mod error;
pub mod platform;
pub mod storage;
pub mod subscription;
pub mod theme;
pub mod worker;

// Re-export main types for convenience
pub use backend::{Backend, HttpBackend, SubscriptionInfo, SubscriptionKeys};
pub use config::{AppConfig, BackendConfig, CacheConfig, PushConfig};
pub use dashboard::{
    ChartDataPoint, DEFAULT_WINDOW_SECS, DashboardConfig, Incident, IncidentUpdate, MonitorStats,
    Percentiles,
};
pub use encoding::{bytes_to_base64, url_base64_to_bytes};
pub use error::{Error, Result, SubscribeError};
pub use platform::{
    Capabilities, MonitorId, PermissionState, Platform, PushRegistration, PushSubscription,
    SubscribeOptions,
};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use subscription::{
    SUBSCRIPTIONS_KEY, SubscriptionManager, SubscriptionRecord, SubscriptionSnapshot,
};
pub use theme::{THEME_KEY, Theme, ThemeStore};
