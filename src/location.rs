//! Location Settings
//!
//! Country → region tree of template assignments, stored as one document:
//!
//! ```json
//! {
//!   "default_template": "default",
//!   "DE": {"template": "strict", "regions": {"BY": "relaxed"}},
//!   "FR": {"template": "inherit", "regions": {"75": {"template": "strict"}}}
//! }
//! ```
//!
//! Resolution walks global default → country → region. At country scope
//! `"inherit"` defers to the default template; at region scope `"inherit"`
//! and `"default"` defer to the country. Sentinels never name a template.

use crate::document::Document;
use crate::error::StorageError;
use crate::geo::{LocationCode, VisibleCountries};
use crate::store::OptionStore;
use crate::template::{TemplateCatalog, DEFAULT_TEMPLATE};
use crate::value::Map;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Top-level key naming the global default template.
pub const DEFAULT_TEMPLATE_KEY: &str = "default_template";

/// Fallback behavior reported when none is configured.
pub const DEFAULT_FALLBACK_BEHAVIOR: &str = "default";

const INHERIT: &str = "inherit";
const REGION_DEFAULT: &str = "default";
const IS_DEFAULT_MARKER: &str = "_is_default";

/// Template reference stored at country or region scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// Defer to the next broader scope
    Inherit,
    /// A template key
    Named(String),
}

impl TemplateRef {
    /// Country scope: only `"inherit"` (or nothing) defers.
    pub fn for_country(raw: &str) -> Self {
        match raw.trim() {
            "" | INHERIT => TemplateRef::Inherit,
            name => TemplateRef::Named(name.to_string()),
        }
    }

    /// Region scope: `"inherit"` and `"default"` (or nothing) defer.
    pub fn for_region(raw: &str) -> Self {
        match raw.trim() {
            "" | INHERIT | REGION_DEFAULT => TemplateRef::Inherit,
            name => TemplateRef::Named(name.to_string()),
        }
    }

    /// Storage spelling.
    pub fn as_str(&self) -> &str {
        match self {
            TemplateRef::Inherit => INHERIT,
            TemplateRef::Named(name) => name,
        }
    }
}

/// Where a resolved template came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSource {
    Default,
    Country,
    Region,
    Fallback,
}

impl TemplateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateSource::Default => "default",
            TemplateSource::Country => "country",
            TemplateSource::Region => "region",
            TemplateSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template resolved for one location, with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub template: String,
    pub fallback_behavior: String,
    pub source: TemplateSource,
}

/// Per-country and per-region template assignments
#[derive(Debug)]
pub struct LocationSettings {
    doc: Document,
    visible: VisibleCountries,
    fallback_behavior: String,
}

impl LocationSettings {
    pub fn new(
        store: Arc<dyn OptionStore>,
        option_key: impl Into<String>,
        visible: VisibleCountries,
    ) -> Self {
        Self {
            doc: Document::new(store, option_key, Map::new()),
            visible,
            fallback_behavior: DEFAULT_FALLBACK_BEHAVIOR.to_string(),
        }
    }

    pub fn with_fallback_behavior(mut self, fallback_behavior: impl Into<String>) -> Self {
        self.fallback_behavior = fallback_behavior.into();
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn visible_countries(&self) -> &VisibleCountries {
        &self.visible
    }

    /// Stored global default, else the catalog's first template, else `""`.
    ///
    /// An empty result means "use the built-in template".
    pub fn get_default_template(&self, templates: &TemplateCatalog) -> String {
        match self.doc.get_key(DEFAULT_TEMPLATE_KEY).and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => templates.first_key().unwrap_or_default().to_string(),
        }
    }

    pub fn set_default_template(&mut self, name: &str) -> &mut Self {
        self.doc
            .set_key(DEFAULT_TEMPLATE_KEY, Value::from(name.trim()));
        self
    }

    /// Resolve the template for `location_code` (`CC` or `CC-RR`).
    ///
    /// Never fails: unknown countries, invisible countries and dangling
    /// template references all resolve to the default template.
    pub fn get_effective_settings(
        &self,
        location_code: &str,
        is_admin_override: bool,
        templates: &TemplateCatalog,
    ) -> EffectiveSettings {
        let code = LocationCode::parse(location_code);
        let default_template = match self.get_default_template(templates) {
            name if name.is_empty() => DEFAULT_TEMPLATE.to_string(),
            name => name,
        };

        let mut template = default_template.clone();
        let mut source = TemplateSource::Default;

        let visible = is_admin_override || self.visible.contains(&code.country);
        if code.is_empty() {
            debug!("No location detected, using default template");
        } else if !visible {
            debug!(country = %code.country, "Country not visible, using default template");
        } else if let Some(node) = self.country_node(&code.country) {
            match TemplateRef::for_country(node_template(&node)) {
                TemplateRef::Inherit => {
                    source = TemplateSource::Fallback;
                }
                TemplateRef::Named(name) => {
                    template = name;
                    source = TemplateSource::Country;
                }
            }

            if let Some(region) = code.region() {
                if let Some(entry) = region_entry(&node, region) {
                    match TemplateRef::for_region(region_template(entry)) {
                        TemplateRef::Inherit => {
                            debug!(location = %code, "Region inherits country template");
                        }
                        TemplateRef::Named(name) => {
                            template = name;
                            source = TemplateSource::Region;
                        }
                    }
                }
            }
        } else {
            debug!(country = %code.country, "No country settings, using default template");
        }

        if !templates.contains(&template) {
            let fallback = if templates.contains(&default_template) {
                default_template
            } else {
                DEFAULT_TEMPLATE.to_string()
            };
            if template != fallback {
                warn!(
                    location = %code,
                    template = %template,
                    fallback = %fallback,
                    "Template not found, falling back to default"
                );
                template = fallback;
                source = TemplateSource::Fallback;
            }
        }

        debug!(
            location = %code,
            template = %template,
            source = %source,
            admin_override = is_admin_override,
            "Resolved effective settings"
        );

        EffectiveSettings {
            template,
            fallback_behavior: self.fallback_behavior.clone(),
            source,
        }
    }

    /// Raw settings for a country, or for a region with the country's keys
    /// inherited underneath. `None` when the country or region is not stored.
    pub fn get_location_settings(&self, location_code: &str) -> Option<Map> {
        let code = LocationCode::parse(location_code);
        let node = self.country_node(&code.country)?;
        let Some(region) = code.region() else {
            return Some(node);
        };

        let entry = region_entry(&node, region)?.clone();
        let mut settings = node;
        settings.shift_remove("regions");
        match entry {
            Value::String(template) => {
                settings.insert("template".to_string(), Value::String(template));
            }
            Value::Object(overrides) => {
                for (key, value) in overrides {
                    settings.insert(key, value);
                }
            }
            _ => return None,
        }
        Some(settings)
    }

    /// Set the template of a country, or of a region when the code has one.
    ///
    /// `new_settings` is a template key or a mapping with a `template` field.
    /// A mapping without `template` is merged into the stored entry, keeping
    /// its template. Returns `false` for other input, or when there is no
    /// stored entry to merge into.
    pub fn update_location_settings(&mut self, location_code: &str, new_settings: &Value) -> bool {
        let code = LocationCode::parse(location_code);
        if code.is_empty() {
            warn!(location = location_code, "Ignoring update without a country code");
            return false;
        }
        let template = match new_settings {
            Value::String(name) => name.trim().to_string(),
            Value::Object(map) => map
                .get("template")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            _ => {
                warn!(location = %code, "Ignoring location settings that are not a mapping");
                return false;
            }
        };

        if let Value::Object(overrides) = new_settings {
            if !overrides.contains_key("template") {
                return match code.region() {
                    Some(region) => self.merge_region(&code.country, region, overrides),
                    None => self.merge_country(&code.country, overrides),
                };
            }
        }

        match code.region() {
            Some(region) => {
                if TemplateRef::for_region(&template) == TemplateRef::Inherit {
                    self.remove_region(&code.country, region);
                    return true;
                }
                let stored = match new_settings {
                    Value::Object(map) => {
                        let mut entry = map.clone();
                        entry.insert("template".to_string(), Value::String(template));
                        Value::Object(entry)
                    }
                    _ => Value::String(template),
                };
                self.ensure_country(&code.country);
                self.doc
                    .set_nested(&[code.country.as_str(), "regions", region], stored);
            }
            None => {
                let template = TemplateRef::for_country(&template);
                self.ensure_country(&code.country);
                self.doc.set_nested(
                    &[code.country.as_str(), "template"],
                    Value::from(template.as_str()),
                );
            }
        }
        true
    }

    /// Merge extra keys into a stored country, keeping its template.
    fn merge_country(&mut self, country: &str, overrides: &Map) -> bool {
        let Some(mut node) = self.country_node(country) else {
            warn!(country, "Ignoring country settings without a template");
            return false;
        };
        for (key, value) in overrides {
            if key != "regions" {
                node.insert(key.clone(), value.clone());
            }
        }
        let country_key = find_key(self.doc.get(), country)
            .unwrap_or(country)
            .to_string();
        self.doc.set_key(&country_key, Value::Object(node));
        true
    }

    /// Merge extra keys into a stored region entry, keeping its template.
    fn merge_region(&mut self, country: &str, region: &str, overrides: &Map) -> bool {
        let stored = self.country_node(country).and_then(|node| {
            let regions = node.get("regions")?.as_object()?;
            let key = find_key(regions, region)?;
            Some((key.to_string(), regions[key].clone()))
        });
        let (region_key, mut entry) = match stored {
            Some((key, Value::Object(entry))) => (key, entry),
            Some((key, Value::String(template))) => {
                let mut entry = Map::new();
                entry.insert("template".to_string(), Value::String(template));
                (key, entry)
            }
            _ => {
                warn!(country, region, "Ignoring region settings without a template");
                return false;
            }
        };
        for (key, value) in overrides {
            entry.insert(key.clone(), value.clone());
        }
        let country_key = find_key(self.doc.get(), country)
            .unwrap_or(country)
            .to_string();
        self.doc.set_nested(
            &[country_key.as_str(), "regions", region_key.as_str()],
            Value::Object(entry),
        );
        true
    }

    /// Assign a template to one region. Sentinels remove the region instead.
    pub fn set_region(&mut self, country: &str, region: &str, template: &str) -> &mut Self {
        let country = country.trim().to_ascii_uppercase();
        let region = region.trim().to_ascii_uppercase();
        match TemplateRef::for_region(template) {
            TemplateRef::Inherit => self.remove_region(&country, &region),
            TemplateRef::Named(name) => {
                self.ensure_country(&country);
                self.doc
                    .set_nested(&[country.as_str(), "regions", region.as_str()], Value::from(name));
                self
            }
        }
    }

    pub fn remove_region(&mut self, country: &str, region: &str) -> &mut Self {
        let country = country.trim().to_ascii_uppercase();
        let Some(node) = self.doc.get_key(&country).and_then(Value::as_object) else {
            return self;
        };
        let Some(regions) = node.get("regions").and_then(Value::as_object) else {
            return self;
        };
        let Some(stored_key) = find_key(regions, region.trim()).map(str::to_string) else {
            return self;
        };

        self.doc
            .remove_nested(&[country.as_str(), "regions", stored_key.as_str()]);
        let emptied = self
            .doc
            .get_nested(&[country.as_str(), "regions"])
            .and_then(Value::as_object)
            .map(Map::is_empty)
            .unwrap_or(false);
        if emptied {
            self.doc.remove_nested(&[country.as_str(), "regions"]);
        }
        self
    }

    /// Reconcile the whole document with a submitted country → settings map.
    ///
    /// Redundant countries are omitted. Countries whose stored region
    /// overrides would otherwise be lost (absent from the submission, or
    /// submitted without a `regions` field) keep them.
    pub fn update_from_form(&mut self, submitted: &Map) -> &mut Self {
        let previous = self.doc.get().clone();
        let default_template = submitted
            .get(DEFAULT_TEMPLATE_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| previous.get(DEFAULT_TEMPLATE_KEY).and_then(Value::as_str))
            .map(str::to_string);

        let mut next = Map::new();
        if let Some(name) = &default_template {
            next.insert(DEFAULT_TEMPLATE_KEY.to_string(), Value::from(name.as_str()));
        }
        let default_name = default_template.unwrap_or_default();

        for (country, config) in submitted {
            if country == DEFAULT_TEMPLATE_KEY {
                continue;
            }
            let country_key = country.trim().to_ascii_uppercase();
            let Some(mut node) = normalize_node(config) else {
                warn!(country = %country_key, "Ignoring submitted country settings that are not a mapping");
                continue;
            };
            let submitted_regions = config
                .as_object()
                .map(|map| map.contains_key("regions"))
                .unwrap_or(false);
            if !submitted_regions {
                if let Some(old_regions) = previous
                    .get(&country_key)
                    .and_then(normalize_node)
                    .and_then(|old| old.get("regions").cloned())
                {
                    node.insert("regions".to_string(), old_regions);
                }
            }
            if is_redundant(&node, &default_name) {
                debug!(country = %country_key, "Country matches default, not storing");
                continue;
            }
            next.insert(country_key, Value::Object(node));
        }

        for (country, value) in &previous {
            if country == DEFAULT_TEMPLATE_KEY || next.contains_key(country) {
                continue;
            }
            let was_submitted = submitted
                .keys()
                .any(|key| key.trim().eq_ignore_ascii_case(country));
            if was_submitted {
                continue;
            }
            if let Some(node) = normalize_node(value).filter(has_regions) {
                info!(country = %country, "Keeping region overrides for country missing from submission");
                next.insert(country.clone(), Value::Object(node));
            }
        }

        self.doc.replace(next);
        self
    }

    /// Drop every country entry that inheritance already implies.
    pub fn optimize(&mut self) -> &mut Self {
        let current = self.doc.get();
        let default_name = current
            .get(DEFAULT_TEMPLATE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut next = Map::new();
        if let Some(default) = current.get(DEFAULT_TEMPLATE_KEY) {
            next.insert(DEFAULT_TEMPLATE_KEY.to_string(), default.clone());
        }
        let mut removed = 0usize;
        for (country, value) in current {
            if country == DEFAULT_TEMPLATE_KEY {
                continue;
            }
            match normalize_node(value) {
                Some(node) if !is_redundant(&node, &default_name) => {
                    next.insert(country.clone(), Value::Object(node));
                }
                _ => removed += 1,
            }
        }

        if removed > 0 {
            info!(removed, "Removed redundant country settings");
        }
        self.doc.replace(next);
        self
    }

    /// Stored country codes, in stored order.
    pub fn countries(&self) -> Vec<String> {
        self.doc
            .get()
            .keys()
            .filter(|key| key.as_str() != DEFAULT_TEMPLATE_KEY)
            .cloned()
            .collect()
    }

    /// Region overrides of a country, sentinel entries removed.
    pub fn region_overrides(&self, country: &str) -> Map {
        self.country_node(country)
            .and_then(|node| normalize_node(&Value::Object(node)))
            .and_then(|node| node.get("regions").and_then(Value::as_object).cloned())
            .unwrap_or_default()
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

    fn country_node(&self, country: &str) -> Option<Map> {
        let data = self.doc.get();
        let key = find_key(data, country.trim())?;
        if key == DEFAULT_TEMPLATE_KEY {
            return None;
        }
        match data.get(key)? {
            Value::Object(node) => Some(node.clone()),
            Value::String(template) => {
                let mut node = Map::new();
                node.insert("template".to_string(), Value::String(template.clone()));
                Some(node)
            }
            _ => None,
        }
    }

    fn ensure_country(&mut self, country: &str) {
        let node = match self.doc.get_key(country) {
            Some(Value::Object(_)) => return,
            Some(Value::String(template)) => serde_json::json!({ "template": template }),
            _ => serde_json::json!({ "template": INHERIT }),
        };
        self.doc.set_key(country, node);
    }
}

/// A country entry is redundant when it has no region overrides and its
/// template is the default one or defers to it.
fn is_redundant(node: &Map, default_template: &str) -> bool {
    if has_regions(node) {
        return false;
    }
    match TemplateRef::for_country(node_template(node)) {
        TemplateRef::Inherit => true,
        TemplateRef::Named(name) => name == default_template,
    }
}

fn has_regions(node: &Map) -> bool {
    node.get("regions")
        .and_then(Value::as_object)
        .map(|regions| !regions.is_empty())
        .unwrap_or(false)
}

/// Canonical country entry: strings become `{template}`, the form marker is
/// stripped and sentinel regions are dropped (an empty `regions` with them).
fn normalize_node(value: &Value) -> Option<Map> {
    let mut node = match value {
        Value::Object(map) => map.clone(),
        Value::String(template) => {
            let mut node = Map::new();
            node.insert("template".to_string(), Value::String(template.clone()));
            node
        }
        _ => return None,
    };
    node.shift_remove(IS_DEFAULT_MARKER);

    if let Some(regions) = node.get("regions") {
        let kept: Map = match regions {
            Value::Object(regions) => regions
                .iter()
                .filter(|(_, entry)| {
                    (entry.is_string() || entry.is_object())
                        && TemplateRef::for_region(region_template(entry)) != TemplateRef::Inherit
                })
                .map(|(region, entry)| (region.clone(), entry.clone()))
                .collect(),
            _ => Map::new(),
        };
        if kept.is_empty() {
            node.shift_remove("regions");
        } else {
            node.insert("regions".to_string(), Value::Object(kept));
        }
    }
    Some(node)
}

fn node_template(node: &Map) -> &str {
    node.get("template").and_then(Value::as_str).unwrap_or_default()
}

fn region_entry<'a>(node: &'a Map, region: &str) -> Option<&'a Value> {
    let regions = node.get("regions")?.as_object()?;
    regions.get(find_key(regions, region)?)
}

fn region_template(entry: &Value) -> &str {
    match entry {
        Value::String(template) => template,
        Value::Object(map) => node_template(map),
        _ => "",
    }
}

/// Exact key match first, then ASCII case-insensitive.
fn find_key<'a>(map: &'a Map, key: &str) -> Option<&'a str> {
    map.keys()
        .find(|stored| stored.as_str() == key)
        .or_else(|| map.keys().find(|stored| stored.eq_ignore_ascii_case(key)))
        .map(String::as_str)
}
