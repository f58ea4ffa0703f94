//! Light/dark theme preference.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Local storage key holding the chosen theme.
pub const THEME_KEY: &str = "theme";

/// Dashboard color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl Theme {
    /// Parses a stored theme name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Name as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// The opposite theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Whether this is the dark theme.
    #[must_use]
    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted theme preference with change notification.
pub struct ThemeStore<S: KeyValueStore> {
    storage: S,
    tx: watch::Sender<Theme>,
}

impl<S: KeyValueStore> ThemeStore<S> {
    /// Loads the stored theme, falling back to the system preference.
    pub async fn load(storage: S, prefers_dark: bool) -> Self {
        let system = if prefers_dark { Theme::Dark } else { Theme::Light };
        let theme = match storage.get_item(THEME_KEY).await {
            Ok(Some(stored)) => Theme::parse(&stored).unwrap_or_else(|| {
                log::warn!("Ignoring unknown stored theme {stored:?}");
                system
            }),
            Ok(None) => system,
            Err(e) => {
                log::error!("Failed to read theme preference: {e}");
                system
            }
        };
        let (tx, _) = watch::channel(theme);
        Self { storage, tx }
    }

    /// Current theme.
    #[must_use]
    pub fn current(&self) -> Theme {
        *self.tx.borrow()
    }

    /// Returns a receiver notified on every change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    /// Sets and persists the theme.
    ///
    /// # Errors
    ///
    /// Returns an error if the preference cannot be persisted. Watchers are
    /// notified either way.
    pub async fn set(&self, theme: Theme) -> Result<()> {
        self.tx.send_replace(theme);
        self.storage.set_item(THEME_KEY, theme.as_str()).await
    }

    /// Switches between light and dark, returning the new theme.
    ///
    /// # Errors
    ///
    /// Returns an error if the preference cannot be persisted.
    pub async fn toggle(&self) -> Result<Theme> {
        let theme = self.current().toggled();
        self.set(theme).await?;
        Ok(theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn falls_back_to_system_preference() {
        let store = ThemeStore::load(MemoryStorage::new(), true).await;
        assert_eq!(store.current(), Theme::Dark);

        let store = ThemeStore::load(MemoryStorage::new(), false).await;
        assert_eq!(store.current(), Theme::Light);
    }

    #[tokio::test]
    async fn stored_theme_wins_over_system() {
        let storage = MemoryStorage::new();
        storage.set_item(THEME_KEY, "light").await.unwrap();
        let store = ThemeStore::load(storage, true).await;
        assert_eq!(store.current(), Theme::Light);
    }

    #[tokio::test]
    async fn unknown_stored_value_uses_system() {
        let storage = MemoryStorage::new();
        storage.set_item(THEME_KEY, "solarized").await.unwrap();
        let store = ThemeStore::load(storage, true).await;
        assert_eq!(store.current(), Theme::Dark);
    }

    #[tokio::test]
    async fn toggle_persists_and_notifies() {
        let store = ThemeStore::load(MemoryStorage::new(), false).await;
        let mut rx = store.watch();

        assert_eq!(store.toggle().await.unwrap(), Theme::Dark);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Theme::Dark);
        assert_eq!(
            store.storage.get_item(THEME_KEY).await.unwrap().as_deref(),
            Some("dark")
        );

        store.set(Theme::Light).await.unwrap();
        assert_eq!(store.current(), Theme::Light);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(Theme::parse(" dark "), Some(Theme::Dark));
        assert_eq!(Theme::parse("Dark"), None);
        assert_eq!(Theme::Dark.toggled().to_string(), "light");
        assert!(Theme::Dark.is_dark());
    }
}
