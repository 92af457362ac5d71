//! Configuration for dockscript

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::project::recent::RECENT_PROJECTS_FILE;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Container engine client binary
    #[serde(default = "default_docker_binary")]
    pub docker_binary: PathBuf,

    /// Client configuration directory (holds the recent projects index)
    #[serde(default = "default_client_config_dir")]
    pub client_config_dir: PathBuf,

    /// Record every visited project in the recent projects index
    #[serde(default = "default_true")]
    pub remember_projects: bool,

    /// Label created resources and filter listings by the active project
    #[serde(default = "default_true")]
    pub scope_resources: bool,
}

fn default_docker_binary() -> PathBuf {
    PathBuf::from("docker")
}

fn default_true() -> bool {
    true
}

/// `$DOCKER_CONFIG`, else `~/.docker`
fn default_client_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DOCKER_CONFIG").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(".docker"))
        .unwrap_or_else(|| PathBuf::from(".docker"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            client_config_dir: default_client_config_dir(),
            remember_projects: true,
            scope_resources: true,
        }
    }
}

impl Config {
    /// Load configuration from file or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Try explicit path first
        if let Some(p) = path {
            if p.exists() {
                return Self::read(p);
            }
            tracing::warn!("config file {} not found, using defaults", p.display());
        }

        // Try XDG config
        if let Some(config_dir) = dirs::config_dir() {
            let config_file = config_dir.join("dockscript/config.toml");
            if config_file.exists() {
                return Self::read(&config_file);
            }
        }

        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Location of the recent projects index
    pub fn recent_projects_file(&self) -> PathBuf {
        self.client_config_dir.join(RECENT_PROJECTS_FILE)
    }
}
