//! Config Assembly
//!
//! Turns a resolved template, the service catalog and the template's
//! consent-mode rules into the single configuration document the consent
//! script consumes, plus a debug record describing how it was resolved.
//!
//! The pipeline:
//! 1. Resolve the effective template for the detected location
//! 2. Copy template config, choosing `translations_json` over `translations`
//! 3. Emit services (tri-state flags only when set)
//! 4. Append consent-mode update snippets to the designated services
//! 5. Flatten `styling.theme` into an ordered list
//! 6. Record provenance

use crate::geo::{DetectedLocation, LocationLookup};
use crate::location::{EffectiveSettings, LocationSettings, TemplateSource};
use crate::service::{Service, ServiceCatalog};
use crate::template::{builtin_default_template, TemplateCatalog, DEFAULT_TEMPLATE};
use crate::value::{form_bool, Map};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Service name meaning "no service designated".
pub const NO_SERVICE: &str = "no_service";

/// Consent fields updated when the analytics service is accepted/declined.
pub const ANALYTICS_CONSENT_FIELDS: &[&str] = &["analytics_storage"];

/// Consent fields updated when the ad service is accepted/declined.
pub const AD_CONSENT_FIELDS: &[&str] = &["ad_storage", "ad_user_data", "ad_personalization"];

/// Order in which theme entries are emitted.
const THEME_ORDER: &[&str] = &["color", "position", "width"];

/// Provenance of an assembled configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRecord {
    pub template_used: String,
    pub template_source: TemplateSource,
    pub detected_country: String,
    pub detected_region: String,
    pub admin_override: bool,
}

/// Output of the assembly pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledConfig {
    pub config: Map,
    pub debug: DebugRecord,
}

impl AssembledConfig {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.config)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.config)
    }

    pub fn debug_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.debug)
    }
}

/// Resolves and assembles configuration from the three catalogs
pub struct ConfigAssembler<'a> {
    locations: &'a LocationSettings,
    templates: &'a TemplateCatalog,
    services: &'a ServiceCatalog,
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(
        locations: &'a LocationSettings,
        templates: &'a TemplateCatalog,
        services: &'a ServiceCatalog,
    ) -> Self {
        Self {
            locations,
            templates,
            services,
        }
    }

    /// Assemble for the location reported by `lookup`.
    pub fn assemble_for(&self, lookup: &dyn LocationLookup) -> AssembledConfig {
        self.assemble(&lookup.lookup())
    }

    pub fn assemble(&self, location: &DetectedLocation) -> AssembledConfig {
        let code = location.location_code();
        let effective = self.locations.get_effective_settings(
            &code.to_string(),
            location.is_admin_override,
            self.templates,
        );
        let config = self.template_config(&effective.template);
        let services = self.services.services();

        info!(
            location = %code,
            template = %effective.template,
            source = %effective.source,
            services = services.len(),
            "Assembling consent configuration"
        );
        assemble_config(&effective, &config, &services, location)
    }

    fn template_config(&self, template: &str) -> Map {
        if let Some(config) = self.templates.resolve_config(template) {
            return config;
        }
        warn!(template, "Template missing from catalog, using default");
        self.templates
            .resolve_config(DEFAULT_TEMPLATE)
            .unwrap_or_else(|| builtin_default_template().config)
    }
}

/// Pure assembly step: no lookups, no storage.
pub fn assemble_config(
    effective: &EffectiveSettings,
    template_config: &Map,
    services: &[Service],
    location: &DetectedLocation,
) -> AssembledConfig {
    let mut config = Map::new();
    for (key, value) in template_config {
        if key == "translations" || key == "translations_json" {
            continue;
        }
        config.insert(key.clone(), value.clone());
    }

    if let Some(translations) = resolve_translations(template_config) {
        config.insert("translations".to_string(), translations);
    }

    let consent_mode = ConsentModeRules::from_config(template_config);
    let services: Vec<Value> = services
        .iter()
        .map(|service| Value::Object(service_entry(service, consent_mode.as_ref())))
        .collect();
    config.insert("services".to_string(), Value::Array(services));

    normalize_theme(&mut config);

    AssembledConfig {
        config,
        debug: DebugRecord {
            template_used: effective.template.clone(),
            template_source: effective.source,
            detected_country: location.country.clone(),
            detected_region: location.region.clone(),
            admin_override: location.is_admin_override,
        },
    }
}

/// `translations_json` wins when it parses to a mapping; otherwise the
/// basic `translations` block is used.
fn resolve_translations(template_config: &Map) -> Option<Value> {
    let basic = template_config.get("translations").cloned();
    match template_config.get("translations_json") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => {
            match serde_json::from_str::<Value>(raw) {
                Ok(parsed @ Value::Object(_)) => Some(parsed),
                Ok(_) => {
                    warn!("translations_json is not a mapping, using basic translations");
                    basic
                }
                Err(err) => {
                    warn!(error = %err, "translations_json is not valid JSON, using basic translations");
                    basic
                }
            }
        }
        Some(parsed @ Value::Object(_)) => Some(parsed.clone()),
        _ => basic,
    }
}

/// Consent-mode wiring taken from `consent_mode_settings`
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConsentModeRules {
    analytics_service: Option<String>,
    ad_service: Option<String>,
}

impl ConsentModeRules {
    /// `None` unless `initialize_consent_mode` is on.
    fn from_config(template_config: &Map) -> Option<Self> {
        let settings = template_config
            .get("consent_mode_settings")
            .and_then(Value::as_object)?;
        let enabled = settings
            .get("initialize_consent_mode")
            .map(form_bool)
            .unwrap_or(false);
        if !enabled {
            return None;
        }
        let designated = |key: &str| {
            settings
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty() && *name != NO_SERVICE)
                .map(str::to_string)
        };
        let rules = Self {
            analytics_service: designated("analytics_storage_service"),
            ad_service: designated("ad_storage_service"),
        };
        debug!(?rules, "Consent mode enabled");
        Some(rules)
    }
}

fn service_entry(service: &Service, consent_mode: Option<&ConsentModeRules>) -> Map {
    let mut on_accept = service.callback.on_accept.clone();
    let mut on_decline = service.callback.on_decline.clone();

    if let Some(rules) = consent_mode {
        let mut inject = |fields: &[&str]| {
            on_accept = append_snippet(&on_accept, &consent_update_snippet(fields, "granted"));
            on_decline = append_snippet(&on_decline, &consent_update_snippet(fields, "denied"));
        };
        if rules.analytics_service.as_deref() == Some(service.name.as_str()) {
            inject(ANALYTICS_CONSENT_FIELDS);
        }
        if rules.ad_service.as_deref() == Some(service.name.as_str()) {
            inject(AD_CONSENT_FIELDS);
        }
    }

    let mut entry = Map::new();
    entry.insert("name".to_string(), Value::from(service.name.as_str()));
    entry.insert("purposes".to_string(), Value::from(service.purposes.clone()));
    entry.insert("cookies".to_string(), Value::from(service.cookies.clone()));
    entry.insert(
        "onInit".to_string(),
        Value::from(service.callback.on_init.as_str()),
    );
    entry.insert("onAccept".to_string(), Value::from(on_accept));
    entry.insert("onDecline".to_string(), Value::from(on_decline));

    let optional_flags = [
        ("required", service.required),
        ("default", service.default),
        ("optOut", service.opt_out),
        ("onlyOnce", service.only_once),
        ("contextualConsentOnly", service.contextual_consent_only),
    ];
    for (key, flag) in optional_flags {
        if let Some(flag) = flag {
            entry.insert(key.to_string(), Value::Bool(flag));
        }
    }
    entry
}

/// Guarded `gtag` consent update for `fields`.
pub fn consent_update_snippet(fields: &[&str], state: &str) -> String {
    let entries = fields
        .iter()
        .map(|field| format!("'{}': '{}'", field, state))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "if (typeof window.gtag === 'function') {{ window.gtag('consent', 'update', {{{}}}); }}",
        entries
    )
}

fn append_snippet(existing: &str, snippet: &str) -> String {
    if existing.trim().is_empty() {
        snippet.to_string()
    } else {
        format!("{}\n{}", existing.trim_end(), snippet)
    }
}

/// `styling.theme` as `{color, position, width}` becomes `[color, position, width]`,
/// keeping only the keys present.
fn normalize_theme(config: &mut Map) {
    let Some(Value::Object(styling)) = config.get_mut("styling") else {
        return;
    };
    let ordered = match styling.get("theme") {
        Some(Value::Object(theme)) => THEME_ORDER
            .iter()
            .filter_map(|key| theme.get(*key).cloned())
            .collect::<Vec<_>>(),
        _ => return,
    };
    styling.insert("theme".to_string(), Value::Array(ordered));
}
