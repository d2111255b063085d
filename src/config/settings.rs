//! Persisted exporter settings
//!
//! The scrape delay and the secret token survive restarts. They live in a
//! small key-value store owned outside the metrics engine; the engine only
//! reads and writes them through `ScrapingSettings` and `SecureTokenManager`.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{ExporterError, Result};

use super::validators::validate_delay;

pub mod keys {
    pub const DELAY: &str = "delay";
    pub const SECURITY_TOKEN: &str = "securityToken";
}

/// Key-value settings collaborator.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, used by tests and when no settings file is wanted.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: DashMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<dyn SettingsStore> {
        Arc::new(Self::new())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file backed store.
///
/// The whole map is rewritten on every `put` through a temp file and a
/// rename, so a crash never leaves a half-written file behind.
pub struct FileSettingsStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettingsStore {
    /// Opens the store, loading existing values if the file exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(
            "Settings store opened at {} with {} entries",
            path.display(),
            values.len()
        );
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ExporterError::settings_store(format!(
                "Failed to replace settings file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&values) {
            // keep memory consistent with what is on disk
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Scrape delay persisted in the settings store, in minutes.
#[derive(Clone)]
pub struct ScrapingSettings {
    store: Arc<dyn SettingsStore>,
    default_delay: u32,
}

impl ScrapingSettings {
    pub fn new(store: Arc<dyn SettingsStore>, default_delay: u32) -> Self {
        Self {
            store,
            default_delay,
        }
    }

    /// Stored delay, or the default when absent, unparsable or non-positive.
    pub fn get_delay(&self) -> u32 {
        match self.store.get(keys::DELAY) {
            Ok(Some(raw)) => match raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|d| validate_delay(d).ok())
            {
                Some(delay) => delay,
                None => {
                    warn!(
                        "Ignoring invalid stored delay '{}', using default {}",
                        raw, self.default_delay
                    );
                    self.default_delay
                }
            },
            Ok(None) => self.default_delay,
            Err(e) => {
                warn!("Failed to read delay setting: {}", e);
                self.default_delay
            }
        }
    }

    pub fn set_delay(&self, delay: i64) -> Result<u32> {
        let delay = validate_delay(delay)?;
        self.store.put(keys::DELAY, &delay.to_string())?;
        Ok(delay)
    }
}

/// Shared secret guarding the pull endpoint. Empty means no authentication.
#[derive(Clone)]
pub struct SecureTokenManager {
    store: Arc<dyn SettingsStore>,
}

impl SecureTokenManager {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn get_token(&self) -> String {
        match self.store.get(keys::SECURITY_TOKEN) {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read security token: {}", e);
                String::new()
            }
        }
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.store.put(keys::SECURITY_TOKEN, token)
    }
}
