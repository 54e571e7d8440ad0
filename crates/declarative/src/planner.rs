//! Execution planner - turns declarations and refreshed state into actions

use crate::diff::{AttributeChange, ResourceDiff, classify, diff_attributes};
use crate::resource::Registry;
use crate::schema::Schema;
use crate::types::{Action, Address, Record, Tracked};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;

/// A declared instance as read from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub address: Address,
    /// Declared attributes, not yet normalized
    pub config: Value,
}

impl Declaration {
    pub fn new(address: Address, config: Value) -> Self {
        Self { address, config }
    }
}

/// One planned action
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
    /// Normalized declared attributes (absent for deletions)
    pub config: Option<Value>,
    /// Tracked record before the change
    pub prior: Option<Record>,
    /// Attribute differences, for display
    pub changes: Vec<AttributeChange>,
}

impl PlannedChange {
    pub fn to_diff(&self) -> ResourceDiff {
        ResourceDiff {
            address: self.address.clone(),
            action: self.action.clone(),
            changes: self.changes.clone(),
        }
    }
}

/// An execution plan: one entry per declared or tracked instance
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan convergence of `tracked` (already refreshed) towards `declarations`
    ///
    /// `missing` lists addresses the refresh found gone remotely; declaring
    /// one of them again plans a recreate instead of a plain create.
    pub fn build(
        registry: &Registry,
        declarations: &[Declaration],
        tracked: &Tracked,
        missing: &BTreeSet<Address>,
    ) -> Result<Self> {
        let mut changes = Vec::with_capacity(declarations.len());
        let mut declared = BTreeSet::new();

        for decl in declarations {
            let address = &decl.address;
            if !declared.insert(address.clone()) {
                anyhow::bail!("{address} is declared more than once");
            }

            let kind = registry.require(&address.kind)?;
            let schema = kind.schema();
            let config = kind
                .normalize(&decl.config)
                .with_context(|| format!("Invalid declaration {address}"))?;

            let planned = match tracked.get(address) {
                None => {
                    let action = if missing.contains(address) {
                        Action::Recreate
                    } else {
                        Action::Create
                    };
                    PlannedChange {
                        address: address.clone(),
                        action,
                        changes: creation_changes(&schema, &config),
                        config: Some(config),
                        prior: None,
                    }
                }
                Some(record) => {
                    let observed = kind
                        .declared(&record.attributes)
                        .with_context(|| format!("Failed to read recorded state of {address}"))?;
                    let diff = diff_attributes(&schema, &config, &observed);
                    let action = classify(&diff);
                    log::debug!("{address}: {action}");
                    PlannedChange {
                        address: address.clone(),
                        action,
                        changes: diff,
                        config: Some(config),
                        prior: Some(record.clone()),
                    }
                }
            };
            changes.push(planned);
        }

        for (address, record) in tracked {
            if !declared.contains(address) {
                changes.push(PlannedChange {
                    address: address.clone(),
                    action: Action::Delete,
                    config: None,
                    prior: Some(record.clone()),
                    changes: Vec::new(),
                });
            }
        }

        Ok(Self { changes })
    }

    /// Plan deletion of every tracked instance
    pub fn destroy(tracked: &Tracked) -> Self {
        Self {
            changes: tracked
                .iter()
                .map(|(address, record)| PlannedChange {
                    address: address.clone(),
                    action: Action::Delete,
                    config: None,
                    prior: Some(record.clone()),
                    changes: Vec::new(),
                })
                .collect(),
        }
    }

    /// Filter plan to only include entries matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            changes: self.changes.into_iter().filter(|c| predicate(c)).collect(),
        }
    }

    /// Filter plan to only include entries matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|c| matches_filter(&c.address, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Entries that change something
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    /// Diffs for every entry that changes something
    pub fn diffs(&self) -> Vec<ResourceDiff> {
        self.pending().map(PlannedChange::to_diff).collect()
    }

    /// Total number of instances in the plan
    pub fn total_resources(&self) -> usize {
        self.changes.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }
}

/// Every declared, non-null attribute of a new instance
fn creation_changes(schema: &Schema, config: &Value) -> Vec<AttributeChange> {
    schema
        .declarable()
        .filter_map(|a| {
            config
                .get(a.name)
                .filter(|v| !v.is_null())
                .map(|v| AttributeChange {
                    name: a.name.to_string(),
                    before: Value::Null,
                    after: v.clone(),
                    force_new: false,
                })
        })
        .collect()
}

/// Parse a target string like "type.name" into (type, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some((kind, name)) if !kind.is_empty() => (Some(kind.to_string()), Some(name.to_string())),
        Some(_) => (None, Some(target.to_string())),
    }
}

/// Check if an address matches the filter criteria
fn matches_filter(address: &Address, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type
        && address.kind != rt
        && !address.kind.starts_with(rt)
    {
        return false;
    }

    if let Some(n) = name
        && address.name != n
    {
        return false;
    }

    true
}
