//! `glprov import` - adopt an existing GitLab resource

use anyhow::{Context as _, Result, bail};
use declarative::{Address, Record};

use super::Workspace;
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let mut ws = Workspace::open(ctx)?;
    let address: Address = address.parse()?;

    if !ws.config.declarations.iter().any(|d| d.address == address) {
        ui::warn(&format!(
            "{address} is not declared in {}; the next apply will destroy it",
            ws.config.path.display()
        ));
    }

    ui::info(&format!("Reading {} {id} from GitLab", address.kind));
    let record = import(&mut ws, &address, id)?;
    ui::success(&format!("Imported {address} (ID {})", record.id));
    Ok(())
}

/// Read the remote instance `id` and record it under `address`
pub fn import(ws: &mut Workspace, address: &Address, id: &str) -> Result<Record> {
    let kind = ws.registry.require(&address.kind)?;
    let mut tracked = ws.tracked();
    if let Some(existing) = tracked.get(address) {
        bail!("{address} is already tracked (ID {})", existing.id);
    }

    log::info!("Importing {address} from {id}");
    let record = kind
        .import(id)
        .with_context(|| format!("Failed to import {address}"))?;

    tracked.insert(address.clone(), record.clone());
    ws.save(&tracked)?;
    Ok(record)
}
