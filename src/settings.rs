use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::decoder::DecoderConfig;

/// Host-persisted scanner preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannerSettings {
    pub decoder: DecoderConfig,
    /// Device picked by the operator last time, if any.
    pub preferred_device: Option<String>,
}

/// JSON-file-backed settings with an in-memory cache. A missing or corrupt
/// file falls back to defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScannerSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            ScannerSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scanner(&self) -> ScannerSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update_scanner(&self, settings: ScannerSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &ScannerSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write settings to {}", self.path.display()))
    }
}
