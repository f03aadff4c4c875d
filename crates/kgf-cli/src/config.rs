//! Layered CLI configuration: TOML file, then environment, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kgf_core::FederationConfig;
use kgf_db::EntityStoreConfig;
use kgf_graph::GraphConfig;
use kgf_web::WebConfig;
use serde::{Deserialize, Serialize};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "kgf.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub federation: FederationConfig,
    pub entity_store: EntityStoreConfig,
    pub graph: GraphConfig,
    pub server: WebConfig,
}

impl AppConfig {
    /// Load `path`, or `kgf.toml` if present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Applies `KGF_DB_PATH` plus the federation and Neo4j variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("KGF_DB_PATH") {
            self.entity_store.path = PathBuf::from(path);
        }
        self.federation = self.federation.with_env_overrides();
        self.graph = self.graph.with_env_overrides();
        self
    }
}
