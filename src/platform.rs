//! Seams over the host platform's push and permission primitives.
//!
//! A browser exposes these as `navigator.serviceWorker`, `PushManager`, and
//! `Notification.permission`. The subscription manager only ever sees them
//! through the traits below, so any host (or a test double) can drive it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{SubscriptionInfo, SubscriptionKeys};
use crate::encoding::bytes_to_base64;
use crate::error::Result;

/// Identifier of a monitor on the backend.
pub type MonitorId = i64;

/// Tri-state notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// The user allowed notifications.
    Granted,
    /// The user blocked notifications.
    Denied,
    /// The user has not decided yet.
    #[default]
    Default,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied => write!(f, "denied"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Which platform features are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Background worker registration is available.
    pub service_worker: bool,
    /// Push messaging is available.
    pub push_manager: bool,
    /// OS notifications can be shown.
    pub notifications: bool,
}

impl Capabilities {
    /// All capabilities present.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            service_worker: true,
            push_manager: true,
            notifications: true,
        }
    }

    /// Push requires both a worker registration and a push manager.
    #[must_use]
    pub const fn supports_push(&self) -> bool {
        self.service_worker && self.push_manager
    }
}

/// A platform-owned push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    /// Push-service URL that delivers to this installation.
    pub endpoint: String,
    /// Client public key (P-256), if the platform exposes it.
    pub p256dh: Option<Vec<u8>>,
    /// Authentication secret, if the platform exposes it.
    pub auth: Option<Vec<u8>>,
}

impl PushSubscription {
    /// Converts to the wire form sent to the backend.
    #[must_use]
    pub fn to_info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            endpoint: self.endpoint.clone(),
            keys: SubscriptionKeys {
                p256dh: bytes_to_base64(self.p256dh.as_deref()),
                auth: bytes_to_base64(self.auth.as_deref()),
            },
        }
    }
}

/// Options for creating a new push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Every push must result in a user-visible notification.
    pub user_visible_only: bool,
    /// Raw VAPID public key bytes.
    pub application_server_key: Vec<u8>,
}

/// The push manager of an active worker registration.
#[async_trait]
pub trait PushRegistration: Send + Sync {
    /// Returns the current subscription for this installation, if any.
    async fn get_subscription(&self) -> Result<Option<PushSubscription>>;

    /// Creates a new subscription with the push service.
    async fn subscribe(&self, options: SubscribeOptions) -> Result<PushSubscription>;

    /// Removes a subscription. Returns whether one was removed.
    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<bool>;
}

/// Host platform primitives used by the subscription manager.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Reports which features the host provides.
    fn capabilities(&self) -> Capabilities;

    /// Current notification permission, without prompting.
    fn permission(&self) -> PermissionState;

    /// Prompts the user for notification permission.
    async fn request_permission(&self) -> PermissionState;

    /// Resolves with the active worker registration.
    ///
    /// Hosts may never resolve this; callers bound it with a timeout.
    async fn ready(&self) -> Option<Arc<dyn PushRegistration>>;
}
