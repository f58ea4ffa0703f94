//! Push payloads and the notifications rendered from them.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform::MonitorId;

/// Title used when the payload has none.
pub const DEFAULT_TITLE: &str = "Monitor Alert";
/// Body used when the payload has none.
pub const DEFAULT_BODY: &str = "A monitored service is down";
/// Target URL used when the payload has none.
pub const DEFAULT_URL: &str = "/";
/// Icon and badge shown with every alert.
pub const NOTIFICATION_ICON: &str = "/favicon.png";

/// JSON body of an inbound push message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    /// Notification title.
    pub title: Option<String>,
    /// Notification body text.
    pub body: Option<String>,
    /// Page to open when the notification is clicked.
    pub url: Option<String>,
    /// Monitor the alert is about.
    pub monitor_id: MonitorId,
}

impl PushPayload {
    /// Parses a push message body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the body is not a JSON object with a
    /// numeric `monitorId`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::Payload(e.to_string()))
    }

    /// Renders the payload as a notification, applying defaults.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        Notification {
            title: non_empty(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            options: NotificationOptions {
                body: non_empty(self.body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
                icon: NOTIFICATION_ICON.to_string(),
                badge: NOTIFICATION_ICON.to_string(),
                tag: monitor_tag(self.monitor_id),
                data: NotificationData {
                    url: non_empty(self.url).unwrap_or_else(|| DEFAULT_URL.to_string()),
                    monitor_id: self.monitor_id,
                },
                require_interaction: true,
                actions: vec![NotificationAction::View, NotificationAction::Close],
            },
        }
    }
}

/// Tag shared by every notification about one monitor.
#[must_use]
pub fn monitor_tag(monitor_id: MonitorId) -> String {
    format!("monitor-{monitor_id}")
}

/// Buttons offered on an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    /// Open the status page.
    View,
    /// Dismiss the alert.
    Close,
}

impl NotificationAction {
    /// Action identifier reported back on click.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Close => "close",
        }
    }

    /// Button label.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::View => "View Status",
            Self::Close => "Dismiss",
        }
    }
}

/// Data attached to a notification for click handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Page to open.
    pub url: String,
    /// Monitor the alert is about.
    pub monitor_id: MonitorId,
}

/// Everything but the title of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    /// Body text below the title.
    pub body: String,
    /// Large icon URL.
    pub icon: String,
    /// Small monochrome badge URL.
    pub badge: String,
    /// Notifications with equal tags replace each other.
    pub tag: String,
    /// Click handling data.
    pub data: NotificationData,
    /// Stay on screen until the user acts on it.
    pub require_interaction: bool,
    /// Buttons, in display order.
    pub actions: Vec<NotificationAction>,
}

/// A notification as handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Headline.
    pub title: String,
    /// Everything else shown with it.
    pub options: NotificationOptions,
}

impl Notification {
    /// URL to open for a click with `action`, if the click should open one.
    ///
    /// Clicking the body (no action) or "view" opens the target; "close"
    /// and unknown actions open nothing.
    #[must_use]
    pub fn click_target(&self, action: Option<&str>) -> Option<&str> {
        match action {
            None | Some("") => Some(self.options.data.url.as_str()),
            Some(action) if action == NotificationAction::View.id() => Some(self.options.data.url.as_str()),
            Some(_) => None,
        }
    }
}

/// In-memory notification tray keeping one notification per tag.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    /// Creates an empty tray.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `notification`, replacing any with the same tag.
    pub fn show(&self, notification: Notification) {
        let Ok(mut shown) = self.shown.lock() else {
            return;
        };
        if let Some(existing) = shown
            .iter_mut()
            .find(|n| n.options.tag == notification.options.tag)
        {
            *existing = notification;
        } else {
            shown.push(notification);
        }
    }

    /// Removes the notification tagged `tag`. Returns whether one was shown.
    pub fn close(&self, tag: &str) -> bool {
        let Ok(mut shown) = self.shown.lock() else {
            return false;
        };
        let before = shown.len();
        shown.retain(|n| n.options.tag != tag);
        shown.len() != before
    }

    /// Currently displayed notifications, oldest first.
    #[must_use]
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }
}
