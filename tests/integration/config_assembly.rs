//! End-to-end assembly: location → template → services → consent script config

use super::test_utils::{Fixture, LOCATIONS_KEY, SERVICES_KEY, TEMPLATES_KEY};
use geoconsent::assembler::ConfigAssembler;
use geoconsent::geo::{DetectedLocation, FixedLocation};
use geoconsent::location::TemplateSource;
use serde_json::json;

fn fixture() -> Fixture {
    Fixture::seeded(
        vec![
            (
                TEMPLATES_KEY,
                json!({
                    "default": {
                        "name": "Default",
                        "config": {
                            "default": false,
                            "styling": {"theme": {"width": "wide", "color": "light", "position": "bottom"}},
                            "translations": {"en": {"consentModal": {"title": "Cookies"}}}
                        }
                    },
                    "strict": {
                        "name": "Strict",
                        "inherits": "default",
                        "config": {
                            "mustConsent": true,
                            "translations_json": "{\"de\": {\"consentModal\": {\"title\": \"Kekse\"}}}",
                            "consent_mode_settings": {
                                "initialize_consent_mode": "on",
                                "analytics_storage_service": "ga",
                                "ad_storage_service": "no_service"
                            }
                        }
                    }
                }),
            ),
            (
                SERVICES_KEY,
                json!({"services": [
                    {"name": "gtm", "required": true, "default": true, "purposes": ["functional"]},
                    {"name": "ga", "required": null, "default": null, "purposes": ["analytics"],
                     "callback": {"onAccept": "console.log('ga');"}},
                    {"title": "nameless"}
                ]}),
            ),
            (
                LOCATIONS_KEY,
                json!({"default_template": "default", "DE": {"template": "strict"}}),
            ),
        ],
        &["DE"],
    )
}

#[test]
fn test_assemble_for_visible_country() {
    let fx = fixture();
    let assembler = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services);
    let out = assembler.assemble_for(&FixedLocation(DetectedLocation::new("DE", "BE")));

    assert_eq!(out.debug.template_used, "strict");
    assert_eq!(out.debug.template_source, TemplateSource::Country);
    assert_eq!(out.debug.detected_country, "DE");
    assert_eq!(out.debug.detected_region, "BE");
    assert!(!out.debug.admin_override);

    assert_eq!(out.config["mustConsent"], json!(true));
    assert_eq!(out.config["default"], json!(false));
    assert_eq!(
        out.config["styling"]["theme"],
        json!(["light", "bottom", "wide"])
    );
    assert_eq!(
        out.config["translations"],
        json!({"de": {"consentModal": {"title": "Kekse"}}})
    );
    assert!(!out.config.contains_key("translations_json"));
}

#[test]
fn test_services_keep_tri_state_flags() {
    let fx = fixture();
    let out = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services)
        .assemble(&DetectedLocation::new("DE", ""));

    let services = out.config["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);

    let gtm = services[0].as_object().unwrap();
    assert_eq!(gtm["required"], json!(true));
    assert_eq!(gtm["default"], json!(true));

    let ga = services[1].as_object().unwrap();
    assert!(!ga.contains_key("required"));
    assert!(!ga.contains_key("default"));
}

#[test]
fn test_consent_mode_snippets_follow_designated_service() {
    let fx = fixture();
    let out = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services)
        .assemble(&DetectedLocation::new("DE", ""));

    let services = out.config["services"].as_array().unwrap();
    let ga_accept = services[1]["onAccept"].as_str().unwrap();
    assert!(ga_accept.starts_with("console.log('ga');\n"));
    assert!(ga_accept.contains("'analytics_storage': 'granted'"));
    let ga_decline = services[1]["onDecline"].as_str().unwrap();
    assert!(ga_decline.contains("'analytics_storage': 'denied'"));

    let gtm_accept = services[0]["onAccept"].as_str().unwrap();
    assert!(!gtm_accept.contains("gtag"));
}

#[test]
fn test_invisible_country_gets_default_config() {
    let fx = fixture();
    let assembler = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services);

    let out = assembler.assemble(&DetectedLocation::new("US", "CA"));
    assert_eq!(out.debug.template_used, "default");
    assert_eq!(out.debug.template_source, TemplateSource::Default);
    assert!(!out.config.contains_key("mustConsent"));
    assert_eq!(
        out.config["translations"],
        json!({"en": {"consentModal": {"title": "Cookies"}}})
    );

    let debug: serde_json::Value = serde_json::from_str(&out.debug_json().unwrap()).unwrap();
    assert_eq!(debug["template_source"], "default");
    assert_eq!(debug["detected_region"], "CA");
}

#[test]
fn test_assembly_with_nothing_stored_uses_builtins() {
    let fx = Fixture::empty(&[]);
    let out = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services)
        .assemble(&DetectedLocation::new("", ""));

    assert_eq!(out.debug.template_used, "default");
    let names: Vec<&str> = out.config["services"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec!["google-tag-manager", "google-analytics", "google-ads"]
    );

    let json = out.to_json().unwrap();
    assert!(json.contains("\"services\""));
}

#[test]
fn test_services_with_loose_stored_fields_are_assembled() {
    let fx = Fixture::seeded(
        vec![(
            SERVICES_KEY,
            json!({"services": [
                {"name": "ga", "title": null},
                {"name": "ads", "translations": []},
                {"name": "gtm", "callback": {"onInit": null, "onAccept": null, "onDecline": null}}
            ]}),
        )],
        &["DE"],
    );
    let out = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services)
        .assemble(&DetectedLocation::new("DE", ""));

    let names: Vec<&str> = out.config["services"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names, vec!["ga", "ads", "gtm"]);
}

#[test]
fn test_debug_record_names_the_template_actually_used() {
    let fx = Fixture::seeded(
        vec![
            (
                TEMPLATES_KEY,
                json!({"default": {"name": "Default", "config": {"marker": "default"}}}),
            ),
            (LOCATIONS_KEY, json!({"default_template": "gone"})),
        ],
        &["US"],
    );
    let out = ConfigAssembler::new(&fx.locations, &fx.templates, &fx.services)
        .assemble(&DetectedLocation::new("US", ""));

    assert_eq!(out.config["marker"], json!("default"));
    assert_eq!(out.debug.template_used, "default");
    assert_eq!(out.debug.template_source, TemplateSource::Fallback);
}
