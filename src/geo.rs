//! Geo inputs: detected visitor location, location codes and the
//! visible-countries allow-list.
//!
//! The IP-to-location lookup itself lives outside this crate; it is consumed
//! through [`LocationLookup`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Result of a location lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLocation {
    /// ISO country code, empty when unknown
    #[serde(default)]
    pub country: String,
    /// Region code within the country, empty when unknown
    #[serde(default)]
    pub region: String,
    /// Set when an administrator forced this location for previewing
    #[serde(default)]
    pub is_admin_override: bool,
}

impl DetectedLocation {
    pub fn new(country: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
            is_admin_override: false,
        }
    }

    pub fn with_admin_override(mut self, is_admin_override: bool) -> Self {
        self.is_admin_override = is_admin_override;
        self
    }

    /// `CC` or `CC-RR`
    pub fn location_code(&self) -> LocationCode {
        LocationCode::from_parts(&self.country, &self.region)
    }
}

/// Source of the visitor's location (geo-IP service, debug override, ...)
pub trait LocationLookup {
    fn lookup(&self) -> DetectedLocation;
}

/// Lookup that always answers with the same location
#[derive(Debug, Clone, Default)]
pub struct FixedLocation(pub DetectedLocation);

impl LocationLookup for FixedLocation {
    fn lookup(&self) -> DetectedLocation {
        self.0.clone()
    }
}

/// Country code with optional region, written `CC` or `CC-RR`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LocationCode {
    pub country: String,
    pub region: Option<String>,
}

impl LocationCode {
    /// Split on the first `-`. Codes are trimmed and upper-cased; an empty
    /// region is treated as absent.
    pub fn parse(code: &str) -> Self {
        let code = code.trim();
        match code.split_once('-') {
            Some((country, region)) => Self::from_parts(country, region),
            None => Self::from_parts(code, ""),
        }
    }

    pub fn from_parts(country: &str, region: &str) -> Self {
        let region = region.trim().to_ascii_uppercase();
        Self {
            country: country.trim().to_ascii_uppercase(),
            region: if region.is_empty() { None } else { Some(region) },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.country.is_empty()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.country, region),
            None => write!(f, "{}", self.country),
        }
    }
}

/// Countries that may receive anything other than the default template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleCountries(BTreeSet<String>);

impl VisibleCountries {
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            countries
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, country: &str) -> bool {
        self.0.contains(&country.to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
