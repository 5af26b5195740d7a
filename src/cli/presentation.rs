//! CLI presentation: text and json formatters per command.

use crate::location::{EffectiveSettings, LocationSettings};
use crate::template::TemplateCatalog;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde_json::{json, Value};

pub fn format_resolve_result(
    code: &str,
    effective: &EffectiveSettings,
    format: &str,
) -> Result<String, serde_json::Error> {
    if format == "json" {
        let value = json!({
            "location": code,
            "template": effective.template,
            "source": effective.source,
            "fallback_behavior": effective.fallback_behavior,
        });
        return serde_json::to_string_pretty(&value);
    }
    Ok(format!(
        "{}: template '{}' (source: {}, fallback: {})",
        code, effective.template, effective.source, effective.fallback_behavior
    ))
}

pub fn format_templates(
    templates: &TemplateCatalog,
    default_template: &str,
    format: &str,
) -> Result<String, serde_json::Error> {
    if format == "json" {
        let arr: Vec<Value> = templates
            .keys()
            .into_iter()
            .map(|key| {
                let template = templates.get_template(&key);
                json!({
                    "key": key,
                    "name": template.as_ref().map(|t| t.name.clone()),
                    "inherits": template.as_ref().and_then(|t| t.inherits.clone()),
                    "default": key == default_template,
                })
            })
            .collect();
        return serde_json::to_string_pretty(&arr);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Key", "Name", "Inherits", "Description", "Default"]);
    for key in templates.keys() {
        let template = templates.get_template(&key);
        let name = template.as_ref().map(|t| t.name.clone()).unwrap_or_default();
        let inherits = template
            .as_ref()
            .and_then(|t| t.inherits.clone())
            .unwrap_or_else(|| "-".to_string());
        let description = template
            .as_ref()
            .map(|t| t.description.clone())
            .unwrap_or_default();
        let marker = if key == default_template { "*" } else { "" };
        table.add_row(vec![
            key.as_str(),
            name.as_str(),
            inherits.as_str(),
            description.as_str(),
            marker,
        ]);
    }
    Ok(table.to_string())
}

pub fn format_countries(
    locations: &LocationSettings,
    format: &str,
) -> Result<String, serde_json::Error> {
    let rows: Vec<(String, String, Vec<(String, String)>)> = locations
        .countries()
        .into_iter()
        .map(|country| {
            let template = locations
                .get_location_settings(&country)
                .and_then(|node| node.get("template").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "inherit".to_string());
            let regions = locations
                .region_overrides(&country)
                .iter()
                .map(|(region, entry)| {
                    let region_template = entry
                        .get("template")
                        .and_then(Value::as_str)
                        .or_else(|| entry.as_str())
                        .unwrap_or("inherit")
                        .to_string();
                    (region.clone(), region_template)
                })
                .collect();
            (country, template, regions)
        })
        .collect();

    if format == "json" {
        let arr: Vec<Value> = rows
            .iter()
            .map(|(country, template, regions)| {
                let regions: serde_json::Map<String, Value> = regions
                    .iter()
                    .map(|(r, t)| (r.clone(), Value::from(t.as_str())))
                    .collect();
                json!({ "country": country, "template": template, "regions": regions })
            })
            .collect();
        return serde_json::to_string_pretty(&arr);
    }

    if rows.is_empty() {
        return Ok("No country settings stored.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Country", "Template", "Region Overrides"]);
    for (country, template, regions) in &rows {
        let regions = if regions.is_empty() {
            "-".to_string()
        } else {
            regions
                .iter()
                .map(|(r, t)| format!("{}={}", r, t))
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![country.as_str(), template.as_str(), regions.as_str()]);
    }
    Ok(table.to_string())
}
