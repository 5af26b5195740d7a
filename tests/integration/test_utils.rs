//! Shared test utilities for integration tests
//!
//! Builds catalogs over a fresh in-memory option store.

use geoconsent::geo::VisibleCountries;
use geoconsent::location::LocationSettings;
use geoconsent::service::ServiceCatalog;
use geoconsent::store::{MemoryOptionStore, OptionStore};
use geoconsent::template::TemplateCatalog;
use serde_json::Value;
use std::sync::Arc;

pub const TEMPLATES_KEY: &str = "klaro_geo_templates";
pub const SERVICES_KEY: &str = "klaro_geo_services";
pub const LOCATIONS_KEY: &str = "klaro_geo_country_settings";

/// The three catalogs over one store
pub struct Fixture {
    pub store: Arc<MemoryOptionStore>,
    pub templates: TemplateCatalog,
    pub services: ServiceCatalog,
    pub locations: LocationSettings,
}

impl Fixture {
    /// Seed the store with raw option values and open every catalog over it.
    pub fn seeded(options: Vec<(&str, Value)>, visible: &[&str]) -> Self {
        let store = Arc::new(MemoryOptionStore::with_options(options));
        let shared: Arc<dyn OptionStore> = store.clone();
        Self {
            templates: TemplateCatalog::new(Arc::clone(&shared), TEMPLATES_KEY),
            services: ServiceCatalog::new(Arc::clone(&shared), SERVICES_KEY),
            locations: LocationSettings::new(
                shared,
                LOCATIONS_KEY,
                VisibleCountries::new(visible.iter().copied()),
            ),
            store,
        }
    }

    pub fn empty(visible: &[&str]) -> Self {
        Self::seeded(Vec::new(), visible)
    }
}
