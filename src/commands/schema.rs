//! `glprov schema` - describe resource attributes

use anyhow::Result;
use colored::Colorize;
use declarative::{Attribute, Mode, Schema};
use gitlab_client::{Client, ClientConfig};

use crate::provider;
use crate::ui;

pub fn run(resource_type: Option<&str>) -> Result<()> {
    // Schemas do not depend on provider settings; nothing is sent.
    let registry = provider::registry(&Client::new(&ClientConfig::default()), "master");

    match resource_type {
        Some(name) => print_schema(&registry.require(name)?.schema()),
        None => {
            for schema in registry.schemas() {
                print_schema(&schema);
            }
        }
    }
    Ok(())
}

fn describe(attr: &Attribute) -> String {
    let mut parts = vec![attr.kind.to_string(), attr.mode.to_string()];
    if attr.force_new {
        parts.push("force-new".to_string());
    }
    if let Some(default) = &attr.default {
        parts.push(format!("default {default}"));
    }
    parts.join(", ")
}

fn print_schema(schema: &Schema) {
    ui::section(schema.type_name);
    for attr in &schema.attributes {
        let name = if attr.mode == Mode::Required {
            attr.name.bold()
        } else {
            attr.name.normal()
        };
        println!("  {:<36} {}", name, describe(attr).dimmed());
        if !attr.description.is_empty() {
            ui::dim(&format!("    {}", attr.description));
        }
    }
}
