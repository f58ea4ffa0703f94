//! The host environment a worker runs in.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::notification::{Notification, NotificationCenter};
use crate::error::Result;

/// Host operations available to the offline worker.
#[async_trait]
pub trait WorkerScope: Send + Sync {
    /// Activates this worker without waiting for older versions' pages to close.
    fn skip_waiting(&self);

    /// Takes control of every open page.
    async fn claim_clients(&self) -> Result<()>;

    /// Displays a notification.
    async fn show_notification(&self, notification: Notification) -> Result<()>;

    /// Dismisses the notification with `tag`.
    async fn close_notification(&self, tag: &str) -> Result<()>;

    /// Opens or focuses a window at `url`.
    async fn open_window(&self, url: &str) -> Result<()>;
}

/// A scope with no UI: notifications go to a [`NotificationCenter`] and
/// window requests are recorded.
#[derive(Debug, Default)]
pub struct HeadlessScope {
    notifications: NotificationCenter,
    opened: Mutex<Vec<String>>,
    skipped_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl HeadlessScope {
    /// Creates a fresh scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The notification tray.
    #[must_use]
    pub const fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// URLs of windows opened so far.
    #[must_use]
    pub fn opened_windows(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Whether `skip_waiting` was called.
    #[must_use]
    pub fn skipped_waiting(&self) -> bool {
        self.skipped_waiting.load(Ordering::SeqCst)
    }

    /// Whether clients were claimed.
    #[must_use]
    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerScope for HeadlessScope {
    fn skip_waiting(&self) {
        self.skipped_waiting.store(true, Ordering::SeqCst);
    }

    async fn claim_clients(&self) -> Result<()> {
        self.claimed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn show_notification(&self, notification: Notification) -> Result<()> {
        log::info!(
            "[{}] {}: {}",
            notification.options.tag,
            notification.title,
            notification.options.body
        );
        self.notifications.show(notification);
        Ok(())
    }

    async fn close_notification(&self, tag: &str) -> Result<()> {
        self.notifications.close(tag);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        log::info!("Opening {url}");
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        Ok(())
    }
}
