use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const APP_DIR_NAME: &str = "easylaunch";

/// Launcher preferences, kept apart from the profile store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(default = "default_true")]
    pub confirm_profile_delete: bool,
    #[serde(default)]
    pub graphics_settings_path: Option<PathBuf>,
}

impl LauncherConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read launcher config")?;
            let mut config: LauncherConfig =
                serde_json::from_str(&raw).context("parse launcher config")?;
            config.data_dir = data_dir.to_path_buf();
            return Ok(config);
        }

        let config = LauncherConfig {
            data_dir: data_dir.to_path_buf(),
            confirm_profile_delete: true,
            graphics_settings_path: None,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize launcher config")?;
        fs::write(self.data_dir.join("config.json"), raw).context("write launcher config")?;
        Ok(())
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("easylaunch.log")
    }
}

fn default_true() -> bool {
    true
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR_NAME))
}
