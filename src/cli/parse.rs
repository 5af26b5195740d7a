//! CLI parse: clap types for geoconsent. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Geoconsent CLI - Geo-aware cookie consent configuration
#[derive(Parser)]
#[command(name = "geoconsent")]
#[command(about = "Resolve and assemble cookie consent configuration per visitor location")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which template applies to a location code (e.g. "DE" or "US-CA")
    Resolve {
        /// Location code
        code: String,
        /// Resolve as an administrator previewing the site
        #[arg(long)]
        admin_override: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Assemble the full consent configuration for a location
    Assemble {
        /// Detected country code
        #[arg(long, default_value = "")]
        country: String,
        /// Detected region code
        #[arg(long, default_value = "")]
        region: String,
        /// Assemble as an administrator previewing the site
        #[arg(long)]
        admin_override: bool,
        /// Include the debug record
        #[arg(long)]
        debug: bool,
    },
    /// Remove redundant country settings
    Optimize,
    /// Manage region overrides
    Region {
        #[command(subcommand)]
        command: RegionCommands,
    },
    /// Import catalogs from JSON files
    Import {
        /// Templates object keyed by template name
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Services list (or {"services": [...]})
        #[arg(long)]
        services: Option<PathBuf>,
        /// Location settings as submitted by the settings form
        #[arg(long)]
        locations: Option<PathBuf>,
    },
    /// List templates
    Templates {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List countries with explicit settings
    Countries {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum RegionCommands {
    /// Assign a template to a region
    Set {
        /// Country code
        country: String,
        /// Region code
        region: String,
        /// Template name ("inherit" follows the country)
        template: String,
    },
    /// Remove a region override
    Remove {
        /// Country code
        country: String,
        /// Region code
        region: String,
    },
}
