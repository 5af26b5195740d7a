//! Template Catalog
//!
//! Named consent templates: each is a bundle of consent-UI settings
//! (`config`) plus plugin-side flags. Every catalog is expected to contain a
//! template keyed [`DEFAULT_TEMPLATE`]; resolution falls back to it.

use crate::document::Document;
use crate::error::StorageError;
use crate::store::OptionStore;
use crate::value::{deep_merge, form_bool, Map};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key of the template every catalog must contain.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Config keys that hold booleans and may arrive as form strings.
pub const BOOLEAN_CONFIG_KEYS: &[&str] = &[
    "testing",
    "htmlTexts",
    "embedded",
    "noAutoLoad",
    "autoFocus",
    "showNoticeTitle",
    "showDescriptionEmptyStore",
    "disablePoweredBy",
    "mustConsent",
    "acceptAll",
    "hideDeclineAll",
    "hideLearnMore",
    "hideToggleAll",
    "noticeAsModal",
    "groupByPurpose",
    "default",
    "required",
];

/// Consent template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Parent template whose config this one overlays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    #[serde(default)]
    pub config: Map,

    #[serde(default)]
    pub wordpress_settings: WordpressSettings,
}

/// Plugin-side settings that never reach the consent script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordpressSettings {
    #[serde(default, deserialize_with = "deserialize_form_bool")]
    pub enable_consent_logging: bool,
}

fn deserialize_form_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(form_bool(&value))
}

/// The built-in template used when a catalog is empty or lacks `default`.
pub fn builtin_default_template() -> Template {
    let config = json!({
        "version": 1,
        "elementID": "klaro",
        "styling": {
            "theme": {"color": "light", "position": "bottom", "width": "wide"}
        },
        "htmlTexts": true,
        "embedded": false,
        "groupByPurpose": true,
        "storageMethod": "cookie",
        "cookieName": "klaro",
        "cookieExpiresAfterDays": 365,
        "default": false,
        "mustConsent": false,
        "acceptAll": true,
        "hideDeclineAll": false,
        "hideLearnMore": false,
        "noticeAsModal": false,
        "disablePoweredBy": false,
        "consent_mode_settings": {
            "initialize_consent_mode": false,
            "analytics_storage_service": "no_service",
            "ad_storage_service": "no_service"
        },
        "translations": {
            "zz": {"privacyPolicyUrl": "/privacy"},
            "en": {
                "consentModal": {
                    "title": "Privacy Settings",
                    "description": "Here you can see and customize the information that we collect about you."
                },
                "consentNotice": {
                    "description": "We use cookies and similar technologies to improve your experience."
                },
                "purposes": {
                    "functional": {"title": "Functional"},
                    "analytics": {"title": "Analytics"},
                    "advertising": {"title": "Advertising"}
                }
            }
        }
    });

    Template {
        name: "Default Template".to_string(),
        description: "Default consent settings".to_string(),
        inherits: None,
        config: config.as_object().cloned().unwrap_or_default(),
        wordpress_settings: WordpressSettings {
            enable_consent_logging: true,
        },
    }
}

fn builtin_catalog() -> Map {
    let mut catalog = Map::new();
    if let Ok(value) = serde_json::to_value(builtin_default_template()) {
        catalog.insert(DEFAULT_TEMPLATE.to_string(), value);
    }
    catalog
}

/// Catalog of consent templates keyed by slug
#[derive(Debug)]
pub struct TemplateCatalog {
    doc: Document,
}

impl TemplateCatalog {
    /// Catalog stored under `option_key`, defaulting to the built-in template.
    pub fn new(store: Arc<dyn OptionStore>, option_key: impl Into<String>) -> Self {
        Self {
            doc: Document::new(store, option_key, builtin_catalog()),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn keys(&self) -> Vec<String> {
        self.doc.get().keys().cloned().collect()
    }

    /// First template key in stored order.
    pub fn first_key(&self) -> Option<&str> {
        self.doc.get().keys().next().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.get().is_empty()
    }

    /// Raw stored template body.
    pub fn get_raw(&self, key: &str) -> Option<&Map> {
        self.doc.get_key(key).and_then(Value::as_object)
    }

    pub fn get_template(&self, key: &str) -> Option<Template> {
        let raw = self.doc.get_key(key)?;
        match Template::deserialize(raw) {
            Ok(template) => Some(template),
            Err(err) => {
                warn!(template = key, error = %err, "Stored template is malformed");
                None
            }
        }
    }

    pub fn set_template(&mut self, key: &str, template: &Template) -> &mut Self {
        match serde_json::to_value(template) {
            Ok(value) => {
                self.doc.set_key(key, value);
            }
            Err(err) => warn!(template = key, error = %err, "Failed to encode template"),
        }
        self
    }

    /// Store a raw template body. Non-mapping input is ignored.
    pub fn set_template_raw(&mut self, key: &str, body: Value) -> &mut Self {
        if !body.is_object() {
            warn!(template = key, "Ignoring template body that is not a mapping");
            return self;
        }
        self.doc.set_key(key, body);
        self
    }

    /// Remove a template. The `default` template cannot be removed.
    pub fn remove_template(&mut self, key: &str) -> &mut Self {
        if key == DEFAULT_TEMPLATE {
            warn!("Refusing to remove the default template");
            return self;
        }
        self.doc.remove_key(key);
        self
    }

    pub fn get_config(&self, key: &str) -> Option<&Map> {
        self.doc
            .get_nested(&[key, "config"])
            .and_then(Value::as_object)
    }

    /// Replace a template's config.
    ///
    /// Boolean fields are normalized. An existing non-empty `translations`
    /// block survives when the incoming config has none.
    pub fn set_config(&mut self, key: &str, mut config: Map) -> &mut Self {
        Self::process_boolean_values(&mut config);

        let incoming_has_translations = config
            .get("translations")
            .map(|t| !is_empty_value(t))
            .unwrap_or(false);
        if !incoming_has_translations {
            if let Some(existing) = self
                .get_config(key)
                .and_then(|c| c.get("translations"))
                .filter(|t| !is_empty_value(t))
                .cloned()
            {
                warn!(
                    template = key,
                    "Incoming config has no translations, keeping the stored ones"
                );
                config.insert("translations".to_string(), existing);
            }
        }

        if !self.contains(key) {
            debug!(template = key, "Creating template from config");
            self.doc.set_key(
                key,
                json!({
                    "name": key,
                    "description": "",
                    "wordpress_settings": {"enable_consent_logging": false}
                }),
            );
        }
        self.doc.set_nested(&[key, "config"], Value::Object(config));
        self
    }

    pub fn get_config_value(&self, key: &str, path: &[&str]) -> Option<&Value> {
        let mut full = vec![key, "config"];
        full.extend_from_slice(path);
        self.doc.get_nested(&full)
    }

    pub fn set_config_value(&mut self, key: &str, path: &[&str], value: Value) -> &mut Self {
        let mut full = vec![key, "config"];
        full.extend_from_slice(path);
        self.doc.set_nested(&full, value);
        self
    }

    pub fn get_translation(&self, key: &str, lang: &str) -> Option<&Map> {
        self.get_config_value(key, &["translations", lang])
            .and_then(Value::as_object)
    }

    pub fn set_translation(&mut self, key: &str, lang: &str, texts: Map) -> &mut Self {
        self.set_config_value(key, &["translations", lang], Value::Object(texts))
    }

    /// Config of `key` with its `inherits` chain applied, parents first.
    ///
    /// Returns `None` only when `key` itself is unknown. A missing parent or a
    /// cycle truncates the chain.
    pub fn resolve_config(&self, key: &str) -> Option<Map> {
        let mut chain: Vec<&Map> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(key.to_string());

        while let Some(name) = current.take() {
            if !seen.insert(name.clone()) {
                warn!(template = key, cycle_at = %name, "Template inheritance cycle");
                break;
            }
            let Some(body) = self.get_raw(&name) else {
                if chain.is_empty() {
                    return None;
                }
                warn!(template = key, parent = %name, "Inherited template not found");
                break;
            };
            chain.push(body);
            current = body
                .get("inherits")
                .and_then(Value::as_str)
                .filter(|parent| !parent.is_empty())
                .map(str::to_string);
        }

        let mut resolved = Map::new();
        for body in chain.iter().rev() {
            if let Some(config) = body.get("config").and_then(Value::as_object) {
                deep_merge(&mut resolved, config, false);
            }
        }
        Some(resolved)
    }

    /// Insert the built-in template if the catalog lacks `default`.
    pub fn ensure_default(&mut self) -> &mut Self {
        if !self.contains(DEFAULT_TEMPLATE) {
            warn!(
                option = %self.doc.option_key(),
                "Template catalog has no default template, inserting built-in"
            );
            let template = builtin_default_template();
            self.set_template(DEFAULT_TEMPLATE, &template);
        }
        self
    }

    /// Coerce form-submitted booleans in place.
    pub fn process_boolean_values(config: &mut Map) {
        for key in BOOLEAN_CONFIG_KEYS {
            if let Some(value) = config.get_mut(*key) {
                *value = Value::Bool(form_bool(value));
            }
        }
        if let Some(Value::Object(consent_mode)) = config.get_mut("consent_mode_settings") {
            if let Some(value) = consent_mode.get_mut("initialize_consent_mode") {
                *value = Value::Bool(form_bool(value));
            }
        }
    }

    pub fn load(&mut self) -> &mut Self {
        self.doc.load();
        self
    }

    pub fn save(&mut self) -> Result<(), StorageError> {
        self.doc.save()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.doc.reset();
        self
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
