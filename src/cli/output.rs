//! Shared CLI output formatting: plain tables for humans, JSON for scripts.

use comfy_table::{presets, ContentArrangement, Table};
use serde::Serialize;

/// A CLI result that knows how to render itself either way.
pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
}

pub fn print(result: &impl CommandOutput, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// A borderless table with uppercased headers, the shape every `list`
/// subcommand renders into.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| h.to_uppercase()));
    table
}
