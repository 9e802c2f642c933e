//! Persisted user settings.
//!
//! Settings live in a small JSON file and are published through a watch
//! channel, so long-running callers can react to changes. The engine only
//! reads the tally mode and the cache window override.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = ".unsmurf-settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tally by alias-table master instead of by normalized name.
    pub alias_mode_active: bool,
    /// Replaces the configured cache validity window.
    pub cache_window_override_hours: Option<u64>,
    /// Show each participant's master next to it.
    pub show_masters: bool,
    /// Mark identities that are no longer current.
    pub show_membership: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alias_mode_active: true,
            cache_window_override_hours: None,
            show_masters: true,
            show_membership: true,
        }
    }
}

impl Settings {
    pub fn cache_window_override(&self) -> Option<Duration> {
        self.cache_window_override_hours
            .map(|h| Duration::from_secs(h.saturating_mul(60 * 60)))
    }
}

/// A partial edit of [`Settings`]; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub alias_mode_active: Option<bool>,
    pub cache_window_hours: Option<u64>,
    /// Drop the cache window override.
    pub clear_cache_window: bool,
    pub show_masters: Option<bool>,
    pub show_membership: Option<bool>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(active) = self.alias_mode_active {
            settings.alias_mode_active = active;
        }
        if self.clear_cache_window {
            settings.cache_window_override_hours = None;
        }
        if let Some(hours) = self.cache_window_hours {
            settings.cache_window_override_hours = Some(hours);
        }
        if let Some(show) = self.show_masters {
            settings.show_masters = show;
        }
        if let Some(show) = self.show_membership {
            settings.show_membership = show;
        }
    }
}

/// Owner of the current [`Settings`] value.
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Open a store backed by `path`.
    ///
    /// A missing file yields defaults; an unreadable or corrupt one yields
    /// defaults with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match Self::read(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No settings at {}, using defaults", path.display());
                Settings::default()
            }
            Err(e) => {
                warn!("Ignoring settings file {}: {:#}", path.display(), e);
                Settings::default()
            }
        };

        let (tx, _rx) = watch::channel(settings);
        Self {
            path: Some(path),
            tx,
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { path: None, tx }
    }

    fn read(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        Ok(Some(settings))
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Apply `change`, persist the result, then notify subscribers.
    ///
    /// Nothing is published if persisting fails.
    pub fn update<F>(&self, change: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.current();
        change(&mut next);

        if let Some(ref path) = self.path {
            let json = serde_json::to_string_pretty(&next).context("Failed to encode settings")?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        }

        self.tx.send_replace(next.clone());
        Ok(next)
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// The effective cache window: the override if set, else `default`.
    pub fn cache_window(&self, default: Duration) -> Duration {
        self.current().cache_window_override().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json"));
        assert_eq!(store.current(), Settings::default());
    }

    #[test]
    fn test_corrupt_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::open(&path);
        assert!(store.current().alias_mode_active);
    }

    #[test]
    fn test_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::open(&path);
        store
            .update(|s| {
                s.alias_mode_active = false;
                s.cache_window_override_hours = Some(1);
            })
            .unwrap();

        let reopened = SettingsStore::open(&path);
        assert!(!reopened.current().alias_mode_active);
        assert_eq!(
            reopened.cache_window(Duration::from_secs(5)),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"show_masters": false}"#).unwrap();

        let settings = SettingsStore::open(&path).current();
        assert!(!settings.show_masters);
        assert!(settings.alias_mode_active);
        assert_eq!(settings.cache_window_override_hours, None);
    }

    #[test]
    fn test_change_applies_only_set_fields() {
        let mut settings = Settings::default();
        let change = SettingsChange {
            alias_mode_active: Some(false),
            cache_window_hours: Some(3),
            ..SettingsChange::default()
        };
        assert!(!change.is_empty());
        change.apply(&mut settings);

        assert!(!settings.alias_mode_active);
        assert_eq!(settings.cache_window_override_hours, Some(3));
        assert!(settings.show_masters);

        SettingsChange {
            clear_cache_window: true,
            ..SettingsChange::default()
        }
        .apply(&mut settings);
        assert_eq!(settings.cache_window_override_hours, None);
        assert!(SettingsChange::default().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let store = SettingsStore::in_memory(Settings::default());
        let mut rx = store.subscribe();

        store.update(|s| s.show_membership = false).unwrap();

        rx.changed().await.unwrap();
        assert!(!rx.borrow().show_membership);
        assert_eq!(store.cache_window(Duration::from_secs(42)), Duration::from_secs(42));
    }
}
