//! Error types for the uptime-push library.

use thiserror::Error;

/// Errors that can occur while talking to the backend, the platform, or
/// local storage.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during storage or cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// The server-provided application key is not valid URL-safe base64.
    #[error("Invalid VAPID public key format: {0}")]
    InvalidVapidKey(String),

    /// The backend answered with a non-success status.
    #[error("Backend rejected {path}: {message}")]
    Backend {
        /// Request path relative to the backend base URL.
        path: String,
        /// HTTP status code returned.
        status: u16,
        /// The body's `error` text, or `HTTP <status>` when it has none.
        message: String,
    },

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The platform's push service or worker host failed.
    #[error("Platform error: {0}")]
    Platform(String),

    /// A cache bucket operation failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The network layer produced something that is not a usable response.
    #[error("invalid response from fetch")]
    InvalidResponse,

    /// The network could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// An inbound push payload could not be understood.
    #[error("Malformed push payload: {0}")]
    Payload(String),
}

/// A specialized `Result` type for uptime-push operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a subscribe or unsubscribe sequence was aborted.
///
/// Each variant maps to one step of the sequence, so callers can match on
/// the failure exhaustively. The `Display` text is what gets surfaced as the
/// manager's error message.
#[derive(Error, Debug)]
pub enum SubscribeError {
    /// Push messaging or worker registration is not available at all.
    #[error("Push notifications are not supported")]
    Unsupported,

    /// No active worker registration became ready in time.
    #[error("Service worker not ready")]
    WorkerNotReady,

    /// The user did not grant notification permission.
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The server key could not be fetched or decoded.
    #[error("Failed to obtain VAPID public key: {0}")]
    ServerKey(#[source] Error),

    /// The platform refused to create or look up a push subscription.
    #[error("Push subscription failed: {0}")]
    PushService(#[source] Error),

    /// The backend did not accept the subscription.
    #[error("Failed to save subscription on server: {0}")]
    Registration(#[source] Error),

    /// The subscribed id set could not be persisted.
    #[error("Failed to persist subscriptions: {0}")]
    Storage(#[source] Error),

    /// The device-level push subscription could not be removed.
    #[error("Failed to unsubscribe: {0}")]
    Unsubscribe(#[source] Error),
}
