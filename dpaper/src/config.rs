//! On-disk configuration: device address and the ordered sync pair list.
//!
//! Lives under the platform config directory, e.g.
//! `~/.config/dpaper/config.json` and `~/.config/dpaper/pairs.json` on
//! Linux. Loading goes through [`anyhow`] so callers get the offending file
//! path in the error chain.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::pairs::SyncPair;

pub const CONFIG_FILENAME: &str = "config.json";
pub const PAIRS_FILENAME: &str = "pairs.json";

/// How to reach the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Base URL of the device web API, e.g. `https://192.168.1.50:8443`.
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub device: Option<DeviceConfig>,
}

impl Config {
    pub fn load_from_file(path: &Utf8Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        serde_json::from_str(&content).with_context(|| format!("parsing config file {path}"))
    }

    pub fn save_to_file(&self, path: &Utf8Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {parent}"))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing config file {path}"))
    }
}

/// Loads the ordered pair list; a missing file is an empty list.
pub fn load_pairs(path: &Utf8Path) -> anyhow::Result<Vec<SyncPair>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("reading pairs file {path}")),
    };
    serde_json::from_str(&content).with_context(|| format!("parsing pairs file {path}"))
}

pub fn save_pairs(path: &Utf8Path, pairs: &[SyncPair]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent}"))?;
    }
    let content = serde_json::to_string_pretty(pairs)?;
    std::fs::write(path, content).with_context(|| format!("writing pairs file {path}"))
}

/// Platform config directory for this program.
pub fn config_dir() -> anyhow::Result<Utf8PathBuf> {
    let dir = dirs::config_dir().context("no config directory on this platform")?;
    let dir = Utf8PathBuf::from_path_buf(dir)
        .map_err(|dir| anyhow::anyhow!("config directory is not UTF-8: {dir:?}"))?;
    Ok(dir.join("dpaper"))
}

pub fn config_file() -> anyhow::Result<Utf8PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILENAME))
}

pub fn pairs_file() -> anyhow::Result<Utf8PathBuf> {
    Ok(config_dir()?.join(PAIRS_FILENAME))
}
