//! Integration tests for catalogs persisted in sled

use geoconsent::geo::VisibleCountries;
use geoconsent::location::{LocationSettings, TemplateSource};
use geoconsent::store::persistence::SledOptionStore;
use geoconsent::store::OptionStore;
use geoconsent::template::TemplateCatalog;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const TEMPLATES: &str = "klaro_geo_templates";
const LOCATIONS: &str = "klaro_geo_country_settings";

fn open(dir: &TempDir) -> Arc<dyn OptionStore> {
    Arc::new(SledOptionStore::new(dir.path().join("db")).unwrap())
}

#[test]
fn test_settings_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();

    {
        let store = open(&dir);
        let mut templates = TemplateCatalog::new(Arc::clone(&store), TEMPLATES);
        templates.set_template_raw("strict", json!({"name": "Strict", "config": {"mustConsent": true}}));
        templates.save().unwrap();

        let mut locations =
            LocationSettings::new(store, LOCATIONS, VisibleCountries::new(["US"]));
        locations
            .set_default_template("default")
            .set_region("us", "ca", "strict");
        locations.save().unwrap();
    }

    let store = open(&dir);
    let templates = TemplateCatalog::new(Arc::clone(&store), TEMPLATES);
    let locations = LocationSettings::new(store, LOCATIONS, VisibleCountries::new(["US"]));

    assert!(templates.contains("strict"));
    let ca = locations.get_effective_settings("US-CA", false, &templates);
    assert_eq!(ca.template, "strict");
    assert_eq!(ca.source, TemplateSource::Region);

    let ny = locations.get_effective_settings("US-NY", false, &templates);
    assert_eq!(ny.template, "default");
    assert_eq!(ny.source, TemplateSource::Fallback);
}

#[test]
fn test_json_string_encoded_option_is_decoded() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store
        .set(
            LOCATIONS,
            &json!(r#"{"default_template":"default","FR":{"template":"strict"}}"#),
        )
        .unwrap();

    let locations = LocationSettings::new(store, LOCATIONS, VisibleCountries::new(["FR"]));
    assert_eq!(locations.countries(), vec!["FR".to_string()]);
}

#[test]
fn test_removed_option_falls_back_to_default_document() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let mut templates = TemplateCatalog::new(Arc::clone(&store), TEMPLATES);
    templates.set_template_raw("strict", json!({"config": {}}));
    templates.save().unwrap();

    store.delete(TEMPLATES).unwrap();
    templates.load();
    assert!(!templates.contains("strict"));
    assert!(templates.contains("default"));
}
