//! `glprov show` - display recorded state

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{Address, Tracked};
use serde_json::Value;

use crate::Context;
use crate::config;
use crate::engine::differ::format_value;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, address: Option<&str>) -> Result<()> {
    let state_path = match &ctx.state {
        Some(path) => path.clone(),
        None => config::Config::load(ctx.config.as_deref())?.default_state_path(),
    };
    let tracked = StateFile::load(&state_path)?.tracked();

    match address {
        None => list(&tracked),
        Some(address) => show(&tracked, &address.parse()?),
    }
}

fn list(tracked: &Tracked) -> Result<()> {
    ui::header("Tracked Resources");
    if tracked.is_empty() {
        ui::dim("Nothing tracked yet");
        return Ok(());
    }
    for (address, record) in tracked {
        println!("  {:<40} {}", address.to_string().bold(), record.id.dimmed());
    }
    Ok(())
}

fn show(tracked: &Tracked, address: &Address) -> Result<()> {
    let Some(record) = tracked.get(address) else {
        bail!("{address} is not tracked");
    };

    ui::header(&address.to_string());
    ui::kv("id", &record.id);
    for (name, value) in attribute_lines(&record.attributes) {
        ui::kv(&name, &value);
    }
    Ok(())
}

/// One line per attribute; nested blocks are flattened with dotted names
fn attribute_lines(attributes: &Value) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    flatten("", attributes, &mut lines);
    lines
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, inner, out);
            }
        }
        Value::Array(items) if items.iter().any(Value::is_object) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&format!("{prefix}.{i}"), item, out);
            }
        }
        other => out.push((prefix.to_string(), format_value(other))),
    }
}
