//! Config loading facade: layers defaults, files and environment.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::EngineConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads [`EngineConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): defaults, global file, workspace files,
    /// `GEOCONSENT__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("GEOCONSENT")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("resolution.visible_countries")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            prefix = %config.storage.option_prefix,
            visible_countries = config.resolution.visible_countries.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
