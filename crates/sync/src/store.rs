//! Durable JSON storage for client configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use wareflow_core::WarehouseId;

use crate::error::SyncError;
use crate::types::ExternalSystemConfig;

/// Storage key for the external system registry.
pub const EXTERNAL_SYSTEMS_KEY: &str = "external_systems";
/// Storage key for the selected warehouse.
pub const ACTIVE_WAREHOUSE_KEY: &str = "active_warehouse";

/// Key-value JSON storage under a namespaced directory, one file per key.
///
/// Missing keys read as empty. A key that exists but does not parse is a
/// configuration error, never silently replaced: the file may hold systems
/// the user cannot cheaply reconstruct.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Store rooted at the platform data directory (`<data_dir>/wareflow`).
    pub fn open_default() -> Result<Self, SyncError> {
        let root = default_root().map_err(|e| SyncError::Configuration(format!("{e:#}")))?;
        Ok(Self { root })
    }

    /// Store rooted at an explicit directory. Used by tests and portable
    /// installs.
    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            SyncError::Configuration(format!(
                "failed to create storage root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_systems(&self) -> Result<BTreeMap<String, ExternalSystemConfig>, SyncError> {
        Ok(self.read_key(EXTERNAL_SYSTEMS_KEY)?.unwrap_or_default())
    }

    pub fn save_systems(
        &self,
        systems: &BTreeMap<String, ExternalSystemConfig>,
    ) -> Result<(), SyncError> {
        self.write_key(EXTERNAL_SYSTEMS_KEY, systems)
    }

    /// Insert or replace one system config, keyed by name.
    pub fn save_system(&self, config: &ExternalSystemConfig) -> Result<(), SyncError> {
        let mut systems = self.load_systems()?;
        systems.insert(config.name.clone(), config.clone());
        self.save_systems(&systems)
    }

    pub fn load_system(&self, name: &str) -> Result<Option<ExternalSystemConfig>, SyncError> {
        Ok(self.load_systems()?.get(name).cloned())
    }

    /// Remove one system. False when no such system was stored.
    pub fn remove_system(&self, name: &str) -> Result<bool, SyncError> {
        let mut systems = self.load_systems()?;
        let removed = systems.remove(name).is_some();
        if removed {
            self.save_systems(&systems)?;
        }
        Ok(removed)
    }

    pub fn save_active_warehouse(&self, id: WarehouseId) -> Result<(), SyncError> {
        self.write_key(ACTIVE_WAREHOUSE_KEY, &id)
    }

    pub fn load_active_warehouse(&self) -> Result<Option<WarehouseId>, SyncError> {
        self.read_key(ACTIVE_WAREHOUSE_KEY)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SyncError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|e| {
            SyncError::Configuration(format!("failed to read key '{key}': {e}"))
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            SyncError::Configuration(format!("corrupt data under key '{key}': {e}"))
        })?;
        Ok(Some(value))
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SyncError> {
        let raw = serde_json::to_string_pretty(value)
            .map_err(|e| SyncError::Configuration(format!("failed to encode key '{key}': {e}")))?;
        fs::write(self.key_path(key), raw)
            .map_err(|e| SyncError::Configuration(format!("failed to write key '{key}': {e}")))
    }
}

fn default_root() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut home| {
                home.push(".local");
                home.push("share");
                home
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut dir = base;
    dir.push("wareflow");
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create storage directory at {dir:?}"))?;
    Ok(dir)
}
