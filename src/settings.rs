use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

pub const DATA_DIR_ENV: &str = "WATCHLATER_DATA_DIR";
pub const DEBUG_ENV: &str = "WATCHLATER_DEBUG";
const DEFAULT_DATA_DIR: &str = ".watchlater";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogSettings {
    /// Identity every RPC sender must present.
    pub extension_id: String,
    pub companion_scheme: String,
    pub launch_companion: bool,
    pub acquire_timeout_ms: u64,
    /// Overrides the platform clipboard command, e.g. `["xclip", "-o"]`.
    pub system_clipboard_command: Option<Vec<String>>,
    pub relay_path: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            extension_id: "watchlater".into(),
            companion_scheme: "watchlater-companion".into(),
            launch_companion: true,
            acquire_timeout_ms: 3_000,
            system_clipboard_command: None,
            relay_path: None,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CatalogSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            CatalogSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> CatalogSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: CatalogSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &CatalogSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), CatalogSettings::default());
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"extension_id": "abc", "acquire_timeout_ms": 50}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.extension_id, "abc");
        assert_eq!(settings.acquire_timeout_ms, 50);
        assert_eq!(settings.companion_scheme, "watchlater-companion");
        assert!(settings.launch_companion);
    }

    #[test]
    fn update_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.relay_path = Some(dir.path().join("relay.txt"));
        settings.launch_companion = false;
        store.update(settings.clone()).unwrap();

        assert_eq!(SettingsStore::new(path).unwrap().get(), settings);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(SettingsStore::new(path).is_err());
    }
}
