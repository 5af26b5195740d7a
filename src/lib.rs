//! Geoconsent: Geo-aware Cookie Consent Configuration
//!
//! Resolves which consent template applies to a visitor's country and region,
//! and assembles the final consent-script configuration from the template,
//! the service catalog and the detected location. Settings live as JSON
//! documents in a keyed option store.

pub mod assembler;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod geo;
pub mod location;
pub mod logging;
pub mod service;
pub mod store;
pub mod template;
pub mod value;
