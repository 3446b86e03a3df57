//! Client configuration file generation.
//!
//! The client reads a `config.json` from its working directory. The
//! installer seeds it with the server connection parameters and the
//! fixed panel resolution, merging into whatever is already there so a
//! registered client keeps its identity (`client_id` and any other keys
//! it has saved) across re-installs.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::account::Account;
use crate::error::InstallError;
use crate::service::descriptor::{PANEL_HEIGHT, PANEL_WIDTH};
use crate::setup::artifacts::chown_if_root;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Keys the client manages itself (registration id, cached state).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            name: default_name(),
            width: default_width(),
            height: default_height(),
            extra: Map::new(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_width() -> u32 {
    PANEL_WIDTH
}

fn default_height() -> u32 {
    PANEL_HEIGHT
}

fn default_name() -> String {
    let hostname = fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|h| h.trim().to_string())
        .unwrap_or_else(|_| "ledwall".to_string());
    if is_raspberry_pi() {
        format!("RaspberryPi-{hostname}")
    } else {
        hostname
    }
}

fn is_raspberry_pi() -> bool {
    fs::read_to_string("/sys/firmware/devicetree/base/model")
        .map(|m| m.to_lowercase().contains("raspberry pi"))
        .unwrap_or(false)
}

/// Write (or update) the client configuration in `workdir`, owned by
/// the target account. The resolution is always forced back to the
/// panel's fixed size.
pub fn write_client_config(
    workdir: &Path,
    account: &Account,
    server_url: Option<&str>,
) -> Result<PathBuf, InstallError> {
    let path = workdir.join(CONFIG_FILE);

    let mut config = load_or_default(&path);
    if let Some(url) = server_url {
        config.server_url = url.to_string();
    }
    config.width = PANEL_WIDTH;
    config.height = PANEL_HEIGHT;

    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| InstallError::System(format!("failed to serialize client config: {e}")))?;

    fs::create_dir_all(workdir).map_err(|e| {
        InstallError::System(format!("failed to create {}: {e}", workdir.display()))
    })?;
    fs::write(&path, format!("{json}\n")).map_err(|e| {
        InstallError::System(format!("failed to write {}: {e}", path.display()))
    })?;
    chown_if_root(&path, account.uid, account.gid)?;

    Ok(path)
}

fn load_or_default(path: &Path) -> ClientConfig {
    if !path.exists() {
        return ClientConfig::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("existing {} is not valid, regenerating: {e}", path.display());
            ClientConfig::default()
        }),
        Err(e) => {
            warn!("could not read {}, regenerating: {e}", path.display());
            ClientConfig::default()
        }
    }
}
