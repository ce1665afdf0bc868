//! `lims.json` configuration.
//!
//! Every field has a default, so a partial file (or no file) is valid.
//! Command-line flags take precedence over file values.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lims_batch::{ControlPolicies, ControlPolicy};

/// File looked up in the store directory when `--config` is not given.
pub const CONFIG_FILE: &str = "lims.json";

/// Store directory used when neither flag nor file names one.
pub const DEFAULT_STORE_DIR: &str = "lims-data";

/// Operator recorded when neither flag, file nor environment names one.
pub const DEFAULT_OPERATOR: &str = "lims";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimsConfig {
    pub store_dir: PathBuf,
    pub operator: Option<String>,
    pub pcr_controls: ControlPolicy,
    pub electrophoresis_controls: ControlPolicy,
    pub rerun_controls: ControlPolicy,
    /// Overrides the ladder spacing of `electrophoresis_controls`.
    pub ladder_section_columns: Option<u8>,
}

impl Default for LimsConfig {
    fn default() -> Self {
        let policies = ControlPolicies::default();
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            operator: None,
            pcr_controls: policies.pcr,
            electrophoresis_controls: policies.electrophoresis,
            rerun_controls: policies.rerun,
            ladder_section_columns: None,
        }
    }
}

impl LimsConfig {
    /// Resolve the configuration for one invocation.
    ///
    /// An explicit `config_path` must exist. Otherwise `lims.json` is read
    /// from the store directory if present. `store_override` replaces the
    /// file's `store_dir`.
    pub fn load(config_path: Option<&Path>, store_override: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::read(path)?,
            None => {
                let dir = store_override.unwrap_or_else(|| Path::new(DEFAULT_STORE_DIR));
                Self::read_optional(&dir.join(CONFIG_FILE))?
            }
        };
        if let Some(dir) = store_override {
            config.store_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn read_optional(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config = serde_json::from_str(&content)
                    .with_context(|| format!("parse config {}", path.display()))?;
                tracing::debug!(path = %path.display(), "loaded config");
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("read config {}", path.display())),
        }
    }

    /// Control policies per batch kind.
    pub fn policies(&self) -> ControlPolicies {
        let mut electrophoresis = self.electrophoresis_controls.clone();
        if let Some(columns) = self.ladder_section_columns {
            electrophoresis.ladder_section_columns = Some(columns);
        }
        ControlPolicies {
            pcr: self.pcr_controls.clone(),
            electrophoresis,
            rerun: self.rerun_controls.clone(),
        }
    }

    /// Operator name: flag, then file, then `$USER`.
    pub fn operator(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.operator.clone())
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_OPERATOR.to_string())
    }
}
