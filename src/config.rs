use crate::addon::Addon;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub auto_update_enabled: bool,
    #[serde(default)]
    pub last_auto_update: Option<String>,
    #[serde(default = "default_true")]
    pub confirm_remove: bool,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let dir = data_dir()?;
        fs::create_dir_all(&dir).context("create app data dir")?;
        let path = dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig {
            api_base_url: default_api_base_url(),
            auto_update_enabled: false,
            last_auto_update: None,
            confirm_remove: true,
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = data_dir()?;
        fs::create_dir_all(&dir).context("create app data dir")?;
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(dir.join("config.json"), raw).context("write app config")?;
        Ok(())
    }
}

/// Everything needed to pick a session back up without another login:
/// the auth key, who it belongs to, whether it is a read-only monitoring
/// session, and the last known addon list. Removed entirely on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCache {
    pub auth_key: String,
    pub email: String,
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub addons: Vec<Addon>,
}

impl SessionCache {
    pub fn load() -> Result<Option<Self>> {
        let path = session_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).context("read session cache")?;
        let mut session: SessionCache =
            serde_json::from_str(&raw).context("parse session cache")?;
        for addon in &mut session.addons {
            addon.reset_transient();
        }
        Ok(Some(session))
    }

    pub fn save(&self) -> Result<()> {
        let path = session_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create app data dir")?;
        }
        let raw = serde_json::to_string(self).context("serialize session cache")?;
        fs::write(path, raw).context("write session cache")?;
        Ok(())
    }

    pub fn clear() -> Result<()> {
        let path = session_path()?;
        if path.exists() {
            fs::remove_file(path).context("remove session cache")?;
        }
        Ok(())
    }
}

pub fn data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("streamsmith"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("streamsmith.log"))
}

fn session_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("session.json"))
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}
