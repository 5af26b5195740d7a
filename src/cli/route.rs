//! CLI route: single route table and run context. Dispatches to the catalogs and presentation.

use crate::assembler::ConfigAssembler;
use crate::cli::parse::{Commands, RegionCommands};
use crate::cli::presentation::{format_countries, format_resolve_result, format_templates};
use crate::config::{ConfigLoader, EngineConfig};
use crate::geo::DetectedLocation;
use crate::location::LocationSettings;
use crate::service::ServiceCatalog;
use crate::store::persistence::SledOptionStore;
use crate::store::OptionStore;
use crate::template::TemplateCatalog;
use anyhow::{bail, Context};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: loaded config, option store and catalogs.
pub struct RunContext {
    config: EngineConfig,
    store: Arc<SledOptionStore>,
    catalogs: Mutex<Catalogs>,
}

struct Catalogs {
    templates: TemplateCatalog,
    services: ServiceCatalog,
    locations: LocationSettings,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root).context("Failed to load configuration")?,
        };
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", messages.join("; "));
        }

        let store_path = if config.storage.path.is_absolute() {
            config.storage.path.clone()
        } else {
            workspace_root.join(&config.storage.path)
        };
        std::fs::create_dir_all(&store_path)
            .with_context(|| format!("Failed to create store directory {}", store_path.display()))?;
        let store = Arc::new(SledOptionStore::new(&store_path)?);

        Ok(Self::with_store(config, store))
    }

    /// Build the context over an already opened store.
    pub fn with_store(config: EngineConfig, store: Arc<SledOptionStore>) -> Self {
        let shared: Arc<dyn OptionStore> = store.clone();
        let mut templates = TemplateCatalog::new(Arc::clone(&shared), config.storage.templates_key());
        templates.ensure_default();
        let services = ServiceCatalog::new(Arc::clone(&shared), config.storage.services_key());
        let locations = LocationSettings::new(
            shared,
            config.storage.locations_key(),
            config.resolution.visible(),
        )
        .with_fallback_behavior(config.resolution.fallback_behavior.clone());

        Self {
            config,
            store,
            catalogs: Mutex::new(Catalogs {
                templates,
                services,
                locations,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        let mut catalogs = self.catalogs.lock();
        let output = match command {
            Commands::Resolve {
                code,
                admin_override,
                format,
            } => {
                let effective = catalogs.locations.get_effective_settings(
                    code,
                    *admin_override,
                    &catalogs.templates,
                );
                format_resolve_result(code, &effective, format)?
            }
            Commands::Assemble {
                country,
                region,
                admin_override,
                debug,
            } => {
                let location =
                    DetectedLocation::new(country.as_str(), region.as_str())
                        .with_admin_override(*admin_override);
                let assembled = ConfigAssembler::new(
                    &catalogs.locations,
                    &catalogs.templates,
                    &catalogs.services,
                )
                .assemble(&location);
                let mut output = assembled.to_json_pretty()?;
                if *debug {
                    output.push('\n');
                    output.push_str(&assembled.debug_json()?);
                }
                output
            }
            Commands::Optimize => {
                let before = catalogs.locations.countries().len();
                catalogs.locations.optimize().save()?;
                let after = catalogs.locations.countries().len();
                format!(
                    "Optimized country settings: {} kept, {} removed",
                    after,
                    before.saturating_sub(after)
                )
            }
            Commands::Region { command } => self.handle_region_command(&mut catalogs, command)?,
            Commands::Import {
                templates,
                services,
                locations,
            } => self.handle_import(
                &mut catalogs,
                templates.as_deref(),
                services.as_deref(),
                locations.as_deref(),
            )?,
            Commands::Templates { format } => {
                let default_template = catalogs.locations.get_default_template(&catalogs.templates);
                format_templates(&catalogs.templates, &default_template, format)?
            }
            Commands::Countries { format } => format_countries(&catalogs.locations, format)?,
        };
        self.store.flush()?;
        Ok(output)
    }

    fn handle_region_command(
        &self,
        catalogs: &mut Catalogs,
        command: &RegionCommands,
    ) -> anyhow::Result<String> {
        match command {
            RegionCommands::Set {
                country,
                region,
                template,
            } => {
                catalogs
                    .locations
                    .set_region(country, region, template)
                    .save()?;
                info!(country = %country, region = %region, template = %template, "Region override set");
                Ok(format!(
                    "{}-{} -> {}",
                    country.to_ascii_uppercase(),
                    region.to_ascii_uppercase(),
                    template
                ))
            }
            RegionCommands::Remove { country, region } => {
                catalogs.locations.remove_region(country, region).save()?;
                info!(country = %country, region = %region, "Region override removed");
                Ok(format!(
                    "Removed override for {}-{}",
                    country.to_ascii_uppercase(),
                    region.to_ascii_uppercase()
                ))
            }
        }
    }

    fn handle_import(
        &self,
        catalogs: &mut Catalogs,
        templates: Option<&Path>,
        services: Option<&Path>,
        locations: Option<&Path>,
    ) -> anyhow::Result<String> {
        if templates.is_none() && services.is_none() && locations.is_none() {
            bail!("Nothing to import: pass --templates, --services or --locations");
        }
        let mut summary = Vec::new();

        if let Some(path) = templates {
            let Value::Object(entries) = read_json(path)? else {
                bail!("{}: templates must be a JSON object", path.display());
            };
            let count = entries.len();
            for (key, body) in entries {
                catalogs.templates.set_template_raw(&key, body);
            }
            catalogs.templates.ensure_default().save()?;
            summary.push(format!("{} templates", count));
        }

        if let Some(path) = services {
            let list = match read_json(path)? {
                Value::Array(list) => list,
                Value::Object(mut wrapper) => match wrapper.remove("services") {
                    Some(Value::Array(list)) => list,
                    _ => bail!("{}: expected a \"services\" list", path.display()),
                },
                _ => bail!("{}: services must be a JSON list", path.display()),
            };
            catalogs.services.set_services(list).save()?;
            summary.push(format!("{} services", catalogs.services.raw_services().len()));
        }

        if let Some(path) = locations {
            let Value::Object(submitted) = read_json(path)? else {
                bail!("{}: location settings must be a JSON object", path.display());
            };
            catalogs.locations.update_from_form(&submitted).save()?;
            summary.push(format!("{} countries", catalogs.locations.countries().len()));
        }

        Ok(format!("Imported {}", summary.join(", ")))
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}
