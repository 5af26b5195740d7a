//! Configuration System
//!
//! Engine configuration: where options are stored, which countries may
//! receive non-default templates, and how logging behaves. Loaded from
//! defaults, a global file, workspace files and environment overrides.

use crate::geo::VisibleCountries;
use crate::location::DEFAULT_FALLBACK_BEHAVIOR;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

mod facade;
mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Option store location and key naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database path
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Prefix of every option key
    #[serde(default = "default_option_prefix")]
    pub option_prefix: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".geoconsent/store")
}

fn default_option_prefix() -> String {
    "klaro_geo".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            option_prefix: default_option_prefix(),
        }
    }
}

impl StorageConfig {
    pub fn templates_key(&self) -> String {
        format!("{}_templates", self.option_prefix)
    }

    pub fn services_key(&self) -> String {
        format!("{}_services", self.option_prefix)
    }

    pub fn locations_key(&self) -> String {
        format!("{}_country_settings", self.option_prefix)
    }
}

/// Resolution behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Countries allowed to receive anything but the default template
    #[serde(default)]
    pub visible_countries: Vec<String>,

    /// Reported alongside every resolved template
    #[serde(default = "default_fallback_behavior")]
    pub fallback_behavior: String,
}

fn default_fallback_behavior() -> String {
    DEFAULT_FALLBACK_BEHAVIOR.to_string()
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            visible_countries: Vec::new(),
            fallback_behavior: default_fallback_behavior(),
        }
    }
}

impl ResolutionConfig {
    pub fn visible(&self) -> VisibleCountries {
        VisibleCountries::new(&self.visible_countries)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Storage: {0}")]
    Storage(String),
    #[error("Resolution: {0}")]
    Resolution(String),
    #[error("Logging: {0}")]
    Logging(String),
}

impl EngineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if self.storage.option_prefix.trim().is_empty() {
            errors.push(ValidationError::Storage(
                "Option prefix cannot be empty".to_string(),
            ));
        }

        for country in &self.resolution.visible_countries {
            let code = country.trim();
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                errors.push(ValidationError::Resolution(format!(
                    "Invalid country code '{}'",
                    country
                )));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
