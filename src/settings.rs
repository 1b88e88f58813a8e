use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "lexiread";
/// Overrides the config file location, mainly for tests.
const CONFIG_ENV_VAR: &str = "LEXIREAD_CONFIG";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            theme: "Oceanic Next".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from disk; any failure falls back to defaults so a
    /// broken config never prevents startup.
    pub fn load() -> Self {
        let path = Self::config_path();
        match fs::read_to_string(&path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("ignoring malformed config {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(&path, yaml)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(custom) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(custom);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(SETTINGS_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn missing_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.yaml");
        unsafe { std::env::set_var(CONFIG_ENV_VAR, &path) };
        assert_eq!(Settings::load(), Settings::default());
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
    }

    #[test]
    #[serial]
    fn settings_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        unsafe { std::env::set_var(CONFIG_ENV_VAR, &path) };

        let settings = Settings {
            server_url: "http://reading.local:8080".to_string(),
            theme: "Catppuccin Mocha".to_string(),
        };
        settings.save().unwrap();
        assert_eq!(Settings::load(), settings);

        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
    }

    #[test]
    #[serial]
    fn malformed_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, ":: not yaml {{{{").unwrap();
        unsafe { std::env::set_var(CONFIG_ENV_VAR, &path) };
        assert_eq!(Settings::load(), Settings::default());
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
    }
}
