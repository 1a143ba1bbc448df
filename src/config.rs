use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Last game directory an install succeeded against.
    #[serde(default)]
    pub game_dir: Option<PathBuf>,
    /// Separate install root, when mods should not touch the vanilla game.
    #[serde(default)]
    pub mod_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub open_on_complete: bool,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_dir: None,
            mod_dir: None,
            open_on_complete: true,
            debug_logging: false,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).context("create app data dir")?;
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_in(dir)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_in(&base_data_dir()?)
    }

    pub fn save_in(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(dir.join(CONFIG_FILE), raw).context("write app config")?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("ddmi"))
}

pub fn log_dir() -> Result<PathBuf> {
    Ok(base_data_dir()?.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(temp.path().join(CONFIG_FILE).is_file());
    }

    #[test]
    fn saved_values_come_back() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            game_dir: Some(PathBuf::from("/games/Doki Doki Literature Club")),
            mod_dir: Some(PathBuf::from("/games/DDLC Modded")),
            open_on_complete: false,
            debug_logging: true,
        };
        config.save_in(temp.path()).unwrap();
        assert_eq!(AppConfig::load_or_create_in(temp.path()).unwrap(), config);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "{}").unwrap();
        let config = AppConfig::load_or_create_in(temp.path()).unwrap();
        assert!(config.open_on_complete);
        assert!(config.game_dir.is_none());
    }
}
