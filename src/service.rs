//! Service Catalog
//!
//! Third-party services the consent script manages: which purposes they serve,
//! which cookies they set and which callbacks run on consent changes.
//!
//! `required` and `default` are tri-state. `None` means "inherit from the
//! template" and survives every normalization; only an explicit value is
//! ever coerced to a boolean.

use crate::document::Document;
use crate::error::StorageError;
use crate::store::OptionStore;
use crate::value::{parse_tristate, split_list, Map};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key holding the service list inside the catalog document.
const SERVICES_KEY: &str = "services";

const CALLBACK_HOOKS: &[&str] = &["onInit", "onAccept", "onDecline"];

const TRISTATE_FIELDS: &[&str] = &[
    "required",
    "default",
    "optOut",
    "onlyOnce",
    "contextualConsentOnly",
];

/// Third-party service descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub purposes: Vec<String>,

    #[serde(default)]
    pub required: Option<bool>,

    #[serde(default)]
    pub default: Option<bool>,

    #[serde(default)]
    pub cookies: Vec<String>,

    #[serde(default)]
    pub callback: Callback,

    #[serde(default)]
    pub translations: Map,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_out: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_once: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextual_consent_only: Option<bool>,
}

/// Script snippets run by the consent script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Callback {
    #[serde(default)]
    pub on_init: String,
    #[serde(default)]
    pub on_accept: String,
    #[serde(default)]
    pub on_decline: String,
}

impl Service {
    /// Parse a stored entry, normalizing loose field shapes first.
    pub fn from_value(value: &Value) -> Option<Service> {
        let raw = value.as_object()?;
        let normalized = Value::Object(normalize_service(raw));
        match Service::deserialize(&normalized) {
            Ok(service) if !service.name.is_empty() => Some(service),
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "Stored service is malformed");
                None
            }
        }
    }
}

/// Services seeded into an empty catalog.
pub fn default_services() -> Vec<Value> {
    vec![
        json!({
            "name": "google-tag-manager",
            "title": "Google Tag Manager",
            "purposes": ["functional"],
            "required": true,
            "default": true,
            "cookies": [],
            "callback": {"onInit": "", "onAccept": "", "onDecline": ""}
        }),
        json!({
            "name": "google-analytics",
            "title": "Google Analytics",
            "purposes": ["analytics"],
            "required": null,
            "default": null,
            "cookies": ["_ga", "_gid", "_gat"],
            "callback": {"onInit": "", "onAccept": "", "onDecline": ""}
        }),
        json!({
            "name": "google-ads",
            "title": "Google Ads",
            "purposes": ["advertising"],
            "required": null,
            "default": null,
            "cookies": ["_gcl_au"],
            "callback": {"onInit": "", "onAccept": "", "onDecline": ""}
        }),
    ]
}

/// Coerce loose shapes: list-or-CSV `purposes`/`cookies`, permissive
/// booleans for flags (null preserved), string `title` and callbacks,
/// mapping-only `callback`/`translations`, numeric names as strings.
///
/// A `name` that is neither a string nor a number is removed.
pub fn normalize_service(raw: &Map) -> Map {
    let mut service = raw.clone();
    for field in ["purposes", "cookies"] {
        if let Some(value) = service.get_mut(field) {
            *value = Value::from(split_list(value));
        }
    }
    for field in TRISTATE_FIELDS {
        if let Some(value) = service.get_mut(*field) {
            *value = parse_tristate(value);
        }
    }
    if let Some(title) = service.get_mut("title") {
        coerce_string(title);
    }
    for field in ["callback", "translations"] {
        if let Some(value) = service.get_mut(field) {
            if !value.is_object() {
                *value = Value::Object(Map::new());
            }
        }
    }
    if let Some(Value::Object(callback)) = service.get_mut("callback") {
        for hook in CALLBACK_HOOKS {
            if let Some(snippet) = callback.get_mut(*hook) {
                coerce_string(snippet);
            }
        }
    }
    match service.get("name") {
        Some(Value::String(name)) => {
            let trimmed = name.trim().to_string();
            service.insert("name".to_string(), Value::String(trimmed));
        }
        Some(Value::Number(number)) => {
            let name = number.to_string();
            service.insert("name".to_string(), Value::String(name));
        }
        Some(_) => {
            service.shift_remove("name");
        }
        None => {}
    }
    service
}

/// Anything but a string becomes `""`.
fn coerce_string(value: &mut Value) {
    if !value.is_string() {
        *value = Value::String(String::new());
    }
}

/// Catalog of third-party services, in display order
#[derive(Debug)]
pub struct ServiceCatalog {
    doc: Document,
}

impl ServiceCatalog {
    /// Catalog seeded with [`default_services`].
    pub fn new(store: Arc<dyn OptionStore>, option_key: impl Into<String>) -> Self {
        Self::with_defaults(store, option_key, default_services())
    }

    /// Catalog seeded with the given services when nothing is stored.
    pub fn with_defaults(
        store: Arc<dyn OptionStore>,
        option_key: impl Into<String>,
        defaults: Vec<Value>,
    ) -> Self {
        let mut default = Map::new();
        default.insert(SERVICES_KEY.to_string(), Value::Array(defaults));
        Self {
            doc: Document::new(store, option_key, default),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Stored entries as-is.
    pub fn raw_services(&self) -> &[Value] {
        match self.doc.get_key(SERVICES_KEY) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// All well-formed services, in order.
    pub fn services(&self) -> Vec<Service> {
        self.raw_services()
            .iter()
            .filter_map(Service::from_value)
            .collect()
    }

    /// First service named `name`.
    pub fn get_service(&self, name: &str) -> Option<Service> {
        self.raw_services()
            .iter()
            .find(|entry| entry_name(entry) == Some(name))
            .and_then(Service::from_value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw_services()
            .iter()
            .any(|entry| entry_name(entry) == Some(name))
    }

    /// Update the first service named `name` with `fields`, or append it.
    pub fn set_service(&mut self, name: &str, fields: &Map) -> &mut Self {
        let name = name.trim();
        if name.is_empty() {
            warn!("Ignoring service update without a name");
            return self;
        }

        let mut services = self.raw_services().to_vec();
        let mut update = normalize_service(fields);
        update.insert("name".to_string(), Value::from(name));

        match services
            .iter_mut()
            .find(|entry| entry_name(entry) == Some(name))
        {
            Some(Value::Object(existing)) => {
                for (key, value) in update {
                    existing.insert(key, value);
                }
            }
            _ => {
                debug!(service = name, "Adding service");
                services.push(Value::Object(update));
            }
        }

        self.doc.set_key(SERVICES_KEY, Value::Array(services));
        self
    }

    /// Replace the whole list. Non-mapping entries are dropped.
    pub fn set_services(&mut self, services: Vec<Value>) -> &mut Self {
        let normalized: Vec<Value> = services
            .iter()
            .filter_map(|entry| match entry.as_object() {
                Some(map) => Some(Value::Object(normalize_service(map))),
                None => {
                    warn!("Dropping service entry that is not a mapping");
                    None
                }
            })
            .collect();
        self.doc.set_key(SERVICES_KEY, Value::Array(normalized));
        self
    }

    pub fn remove_service(&mut self, name: &str) -> &mut Self {
        let services: Vec<Value> = self
            .raw_services()
            .iter()
            .filter(|entry| entry_name(entry) != Some(name))
            .cloned()
            .collect();
        self.doc.set_key(SERVICES_KEY, Value::Array(services));
        self
    }

    /// Drop nameless entries and backfill missing fields.
    ///
    /// Missing `purposes`/`cookies`/`callback` become empty containers and
    /// missing `required`/`default` become `false`. An explicit null is kept.
    pub fn validate_services(&mut self) -> &mut Self {
        let mut validated = Vec::new();
        for entry in self.raw_services() {
            let Some(map) = entry.as_object() else {
                warn!("Dropping service entry that is not a mapping");
                continue;
            };
            let mut service = normalize_service(map);
            let named = service
                .get("name")
                .and_then(Value::as_str)
                .map(|n| !n.is_empty())
                .unwrap_or(false);
            if !named {
                warn!("Dropping service without a name");
                continue;
            }
            for field in ["purposes", "cookies"] {
                service
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
            }
            service
                .entry("callback")
                .or_insert_with(|| Value::Object(Map::new()));
            for field in ["required", "default"] {
                service.entry(field).or_insert(Value::Bool(false));
            }
            validated.push(Value::Object(service));
        }
        self.doc.set_key(SERVICES_KEY, Value::Array(validated));
        self
    }

    pub fn load(&mut self) -> &mut Self {
        self.doc.load();
        self
    }

    /// Validate, then persist if anything changed.
    pub fn save(&mut self) -> Result<(), StorageError> {
        self.validate_services();
        self.doc.save()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.doc.reset();
        self
    }
}

fn entry_name(entry: &Value) -> Option<&str> {
    entry.get("name").and_then(Value::as_str).map(str::trim)
}
