//! Integration tests for country/region template resolution

use super::test_utils::{Fixture, LOCATIONS_KEY, TEMPLATES_KEY};
use geoconsent::location::TemplateSource;
use serde_json::json;

fn two_template_fixture(visible: &[&str]) -> Fixture {
    Fixture::seeded(
        vec![
            (
                TEMPLATES_KEY,
                json!({
                    "default": {"name": "Default", "config": {"default": false}},
                    "strict": {"name": "Strict", "config": {"default": false, "mustConsent": true}}
                }),
            ),
            (
                LOCATIONS_KEY,
                json!({
                    "default_template": "default",
                    "DE": {"template": "strict", "regions": {"BY": "inherit"}}
                }),
            ),
        ],
        visible,
    )
}

#[test]
fn test_region_inheriting_country_resolves_to_country_template() {
    let fx = two_template_fixture(&["DE", "US"]);

    let by = fx.locations.get_effective_settings("DE-BY", false, &fx.templates);
    assert_eq!(by.template, "strict");
    assert_eq!(by.source, TemplateSource::Country);

    let de = fx.locations.get_effective_settings("DE", false, &fx.templates);
    assert_eq!(de.template, "strict");
    assert_eq!(de.source, TemplateSource::Country);
}

#[test]
fn test_unknown_country_resolves_to_default() {
    let fx = two_template_fixture(&["DE", "US"]);
    let us = fx.locations.get_effective_settings("US", false, &fx.templates);
    assert_eq!(us.template, "default");
    assert_eq!(us.source, TemplateSource::Default);
    assert_eq!(us.fallback_behavior, "default");
}

#[test]
fn test_invisible_country_gets_default_unless_admin() {
    let fx = two_template_fixture(&["US"]);

    let visitor = fx.locations.get_effective_settings("DE", false, &fx.templates);
    assert_eq!(visitor.template, "default");
    assert_eq!(visitor.source, TemplateSource::Default);

    let admin = fx.locations.get_effective_settings("DE", true, &fx.templates);
    assert_eq!(admin.template, "strict");
    assert_eq!(admin.source, TemplateSource::Country);
}

#[test]
fn test_region_override_wins_over_country() {
    let mut fx = two_template_fixture(&["DE"]);
    fx.templates
        .set_template_raw("relaxed", json!({"name": "Relaxed", "config": {}}));
    fx.locations.set_region("de", "he", "relaxed");

    let he = fx.locations.get_effective_settings("DE-HE", false, &fx.templates);
    assert_eq!(he.template, "relaxed");
    assert_eq!(he.source, TemplateSource::Region);

    let lowercase = fx.locations.get_effective_settings("de-he", false, &fx.templates);
    assert_eq!(lowercase, he);
}

#[test]
fn test_missing_template_falls_back_to_default() {
    let fx = Fixture::seeded(
        vec![
            (
                TEMPLATES_KEY,
                json!({"default": {"name": "Default", "config": {}}}),
            ),
            (
                LOCATIONS_KEY,
                json!({"default_template": "default", "FR": {"template": "ghost"}}),
            ),
        ],
        &["FR"],
    );

    let fr = fx.locations.get_effective_settings("FR", false, &fx.templates);
    assert_eq!(fr.template, "default");
    assert_eq!(fr.source, TemplateSource::Fallback);
}

#[test]
fn test_default_template_falls_back_to_first_catalog_key() {
    let fx = Fixture::seeded(
        vec![(
            TEMPLATES_KEY,
            json!({"house": {"name": "House", "config": {}}, "strict": {"config": {}}}),
        )],
        &[],
    );
    assert_eq!(fx.locations.get_default_template(&fx.templates), "house");

    let anywhere = fx.locations.get_effective_settings("BR", false, &fx.templates);
    assert_eq!(anywhere.template, "house");
}

#[test]
fn test_location_settings_for_region_include_country_keys() {
    let mut fx = two_template_fixture(&["DE"]);
    fx.locations
        .update_location_settings("DE-NW", &json!({"template": "default", "note": "west"}));
    assert!(fx.locations.get_location_settings("DE-NW").is_none());

    fx.locations
        .update_location_settings("DE-NW", &json!({"template": "strict", "note": "west"}));
    let nw = fx.locations.get_location_settings("DE-NW").unwrap();
    assert_eq!(nw.get("template"), Some(&json!("strict")));
    assert_eq!(nw.get("note"), Some(&json!("west")));
    assert!(!nw.contains_key("regions"));

    assert!(fx.locations.get_location_settings("DE-XX").is_none());
    assert!(fx.locations.get_location_settings("IT").is_none());
}

#[test]
fn test_update_location_settings_rejects_non_mapping() {
    let mut fx = two_template_fixture(&["DE"]);
    assert!(!fx.locations.update_location_settings("DE", &json!(42)));
    assert!(!fx.locations.document().is_modified());

    assert!(fx.locations.update_location_settings("IT", &json!("strict")));
    let it = fx.locations.get_location_settings("IT").unwrap();
    assert_eq!(it.get("template"), Some(&json!("strict")));
}

#[test]
fn test_malformed_location_document_is_replaced_by_default() {
    let fx = Fixture::seeded(vec![(LOCATIONS_KEY, json!("{not json"))], &["DE"]);
    assert!(fx.locations.countries().is_empty());

    let de = fx.locations.get_effective_settings("DE", false, &fx.templates);
    assert_eq!(de.template, "default");
    assert_eq!(de.source, TemplateSource::Default);
}
