//! CLI domain: parse, route, output, and presentation only.
//! No resolution logic; single route table dispatches to the catalogs.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, RegionCommands};
pub use presentation::{format_countries, format_resolve_result, format_templates};
pub use route::RunContext;
