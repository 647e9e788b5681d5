use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::scoring::Lexicon;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowSettings {
    /// Bucket width; also the minimum age before a small window is ready.
    pub window_size_ms: u64,
    /// Sweep cadence. Kept shorter than the window to bound added latency.
    pub check_interval_ms: u64,
    pub min_messages: usize,
    /// Reaching this count makes a window ready immediately.
    pub max_messages: usize,
    /// Collecting windows older than `stale_factor × window_size_ms` are dropped.
    pub stale_factor: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            window_size_ms: 30_000,
            check_interval_ms: 5_000,
            min_messages: 2,
            max_messages: 5,
            stale_factor: 2,
        }
    }
}

/// Upper bound on one window; longer values are clamped.
pub const MAX_WINDOW_SIZE_MS: u64 = 7 * 24 * 60 * 60 * 1000;
pub const MAX_STALE_FACTOR: u32 = 1_000;

impl WindowSettings {
    /// Clamped to `1 ..= MAX_WINDOW_SIZE_MS`.
    pub fn window_size(&self) -> chrono::Duration {
        let ms = self.window_size_ms.clamp(1, MAX_WINDOW_SIZE_MS);
        chrono::Duration::milliseconds(ms as i64)
    }

    /// Age after which a collecting window is dropped. `stale_factor` is
    /// clamped to `1 ..= MAX_STALE_FACTOR`.
    pub fn stale_after(&self) -> chrono::Duration {
        let factor = self.stale_factor.clamp(1, MAX_STALE_FACTOR) as i32;
        self.window_size()
            .checked_mul(factor)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisSettings {
    /// Neighbors fetched from the vector store per message.
    pub top_k: usize,
    pub embedding_dimension: usize,
    /// Chunk size when embedding anchor terms during initialization.
    pub embedding_batch_size: usize,
    /// Bound on in-memory reference embeddings.
    pub reference_cache_capacity: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            embedding_dimension: 1536,
            embedding_batch_size: 100,
            reference_cache_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    pub ttl_secs: u64,
    /// Key entries by `(room_id, text)` instead of text alone.
    pub scope_by_room: bool,
    /// `None` keeps the cache in memory.
    pub db_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            scope_by_room: false,
            db_path: None,
        }
    }
}

impl CacheSettings {
    /// Saturates at `chrono::Duration::MAX` for very large values.
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub window: WindowSettings,
    pub analysis: AnalysisSettings,
    pub cache: CacheSettings,
    /// JSON lexicon replacing the built-in anchor lists.
    pub lexicon_path: Option<PathBuf>,
}

impl Settings {
    /// Apply `CHATPULSE_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_u64("CHATPULSE_WINDOW_MS") {
            self.window.window_size_ms = ms;
        }
        if let Some(ms) = env_u64("CHATPULSE_CHECK_INTERVAL_MS") {
            self.window.check_interval_ms = ms;
        }
        if let Some(secs) = env_u64("CHATPULSE_CACHE_TTL_SECS") {
            self.cache.ttl_secs = secs;
        }
        if let Ok(path) = std::env::var("CHATPULSE_DB_PATH") {
            if !path.trim().is_empty() {
                self.cache.db_path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn load_lexicon(&self) -> Result<Lexicon> {
        match &self.lexicon_path {
            Some(path) => Lexicon::from_json_file(path),
            None => Ok(Lexicon::default()),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Ignoring {key}={raw:?}: {err}");
            None
        }
    }
}

/// JSON-file backed settings with in-place updates.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            Settings::default()
        };
        data.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        self.read().clone()
    }

    pub fn update<F>(&self, apply: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let mut data: Settings = serde_json::from_str(&contents)?;
        data.apply_env_overrides();
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chatpulse-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "window": { "windowSizeMs": 10000 } }"#).unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        let settings = store.settings();

        assert_eq!(settings.window.window_size_ms, 10_000);
        assert_eq!(settings.window.max_messages, 5);
        assert_eq!(settings.analysis.top_k, 5);
        assert!(!settings.cache.scope_by_room);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn update_persists_to_disk() {
        let path = temp_path("update");
        let store = SettingsStore::new(path.clone()).unwrap();

        store
            .update(|settings| settings.cache.scope_by_room = true)
            .unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap();
        assert!(reopened.settings().cache.scope_by_room);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("bad");
        fs::write(&path, "{ not json").unwrap();
        assert!(SettingsStore::new(path.clone()).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn extreme_window_values_are_clamped() {
        let window = WindowSettings {
            window_size_ms: u64::MAX,
            stale_factor: u32::MAX,
            ..WindowSettings::default()
        };

        assert_eq!(
            window.window_size(),
            chrono::Duration::milliseconds(MAX_WINDOW_SIZE_MS as i64)
        );
        assert!(window.stale_after() > window.window_size());

        let zero = WindowSettings {
            window_size_ms: 0,
            stale_factor: 0,
            ..WindowSettings::default()
        };
        assert_eq!(zero.window_size(), chrono::Duration::milliseconds(1));
        assert_eq!(zero.stale_after(), chrono::Duration::milliseconds(1));
    }

    #[test]
    fn huge_ttl_saturates() {
        let cache = CacheSettings {
            ttl_secs: u64::MAX,
            ..CacheSettings::default()
        };
        assert_eq!(cache.ttl(), chrono::Duration::MAX);
        assert_eq!(CacheSettings::default().ttl(), chrono::Duration::hours(24));
    }
}
