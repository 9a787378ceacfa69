//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/modeltree/modeltree.toml`
//! 3. Local config: an explicit file passed by the caller
//! 4. Environment variables: `MODELTREE__*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::DEFAULT_ATTACHMENTS_KEY;

/// How child nodes are addressed below their parent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathLayout {
    /// Mapping keyed by index: `/attachments/0`
    #[default]
    Keyed,
    /// List element: `/attachments[0]`
    List,
}

/// Unified configuration for modeltree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Key holding the child nodes of a configuration node
    pub attachments_key: String,
    /// Addressing used by in-memory source trees
    pub path_layout: PathLayout,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            attachments_key: DEFAULT_ATTACHMENTS_KEY.to_string(),
            path_layout: PathLayout::default(),
        }
    }
}

/// Get the XDG config directory for modeltree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "modeltree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("modeltree.toml"))
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional config file overriding the global one; must exist if given
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("attachments_key", defaults.attachments_key)
            .map_err(config_err)?
            .set_default("path_layout", "keyed")
            .map_err(config_err)?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }
        if let Some(local_path) = local {
            builder = builder.add_source(File::from(local_path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix("MODELTREE").separator("__"));

        let config = builder.build().map_err(config_err)?;
        let settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text, missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ApplicationError> {
        let settings: Self = toml::from_str(content).map_err(|e| ApplicationError::Config {
            message: format!("parse settings: {e}"),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.attachments_key.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "attachments_key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# modeltree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/modeltree/modeltree.toml
#   Local:  file passed to Settings::load
#   Env:    MODELTREE__* environment variables (e.g. MODELTREE__ATTACHMENTS_KEY)

# Key holding the child nodes of a configuration node. A model node without
# children of its own addresses its inlined model at <path>/<key>/0.
# attachments_key = "attachments"

# Addressing of in-memory source trees: "keyed" (/attachments/0)
# or "list" (/attachments[0])
# path_layout = "keyed"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
