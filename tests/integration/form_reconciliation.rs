//! Integration tests for settings-form reconciliation and compaction

use super::test_utils::{Fixture, LOCATIONS_KEY};
use geoconsent::store::OptionStore;
use serde_json::{json, Value};

fn submitted(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_region_overrides_survive_country_missing_from_form() {
    let mut fx = Fixture::seeded(
        vec![(
            LOCATIONS_KEY,
            json!({
                "default_template": "default",
                "FR": {"template": "default", "regions": {"75": "strict"}}
            }),
        )],
        &["FR"],
    );

    fx.locations
        .update_from_form(&submitted(json!({"DE": {"template": "strict"}})));

    let fr = fx.locations.get_location_settings("FR").unwrap();
    assert_eq!(fr["regions"], json!({"75": "strict"}));
    assert_eq!(
        fx.locations.document().get_key("DE"),
        Some(&json!({"template": "strict"}))
    );
    assert_eq!(
        fx.locations.document().get_key("default_template"),
        Some(&json!("default"))
    );
}

#[test]
fn test_redundant_countries_are_not_stored() {
    let mut fx = Fixture::seeded(
        vec![(LOCATIONS_KEY, json!({"default_template": "default"}))],
        &[],
    );

    fx.locations.update_from_form(&submitted(json!({
        "US": {"template": "default", "_is_default": "1"},
        "CA": {"template": "inherit", "regions": {"QC": "inherit", "ON": ""}},
        "BR": {"template": "strict", "_is_default": "0"}
    })));

    assert_eq!(fx.locations.countries(), vec!["BR".to_string()]);
    assert_eq!(
        fx.locations.document().get_key("BR"),
        Some(&json!({"template": "strict"}))
    );
}

#[test]
fn test_form_with_new_default_template() {
    let mut fx = Fixture::seeded(
        vec![(
            LOCATIONS_KEY,
            json!({"default_template": "default", "DE": {"template": "strict"}}),
        )],
        &[],
    );

    fx.locations.update_from_form(&submitted(json!({
        "default_template": "strict",
        "DE": {"template": "strict"}
    })));

    assert!(fx.locations.countries().is_empty());
    assert_eq!(
        fx.locations.document().get_key("default_template"),
        Some(&json!("strict"))
    );
}

#[test]
fn test_explicit_empty_regions_clear_overrides() {
    let mut fx = Fixture::seeded(
        vec![(
            LOCATIONS_KEY,
            json!({"DE": {"template": "strict", "regions": {"BY": "relaxed"}}}),
        )],
        &[],
    );

    fx.locations
        .update_from_form(&submitted(json!({"DE": {"template": "strict", "regions": {}}})));
    assert!(fx.locations.region_overrides("DE").is_empty());

    fx.locations
        .update_from_form(&submitted(json!({"DE": {"template": "relaxed"}})));
    assert_eq!(
        fx.locations.document().get_key("DE"),
        Some(&json!({"template": "relaxed"}))
    );
}

#[test]
fn test_optimize_then_save_persists_compacted_document() {
    let mut fx = Fixture::seeded(
        vec![(
            LOCATIONS_KEY,
            json!({
                "default_template": "default",
                "US": {"template": "default"},
                "MX": "inherit",
                "DE": {"template": "strict"},
                "CA": {"template": "inherit", "regions": {"QC": "strict"}},
                "IT": {"template": "inherit", "regions": {"RM": "inherit"}}
            }),
        )],
        &[],
    );

    fx.locations.optimize().save().unwrap();

    let stored = fx.store.get(LOCATIONS_KEY).unwrap().unwrap();
    assert_eq!(
        stored,
        json!({
            "default_template": "default",
            "DE": {"template": "strict"},
            "CA": {"template": "inherit", "regions": {"QC": "strict"}}
        })
    );
}

#[test]
fn test_save_without_changes_does_not_write() {
    let mut fx = Fixture::empty(&[]);
    fx.locations.optimize().save().unwrap();
    assert!(fx.store.get(LOCATIONS_KEY).unwrap().is_none());
}
