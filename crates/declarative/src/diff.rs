//! Attribute-level diffing between declared and observed state

use crate::schema::{Mode, Schema};
use crate::types::{Action, Address};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single attribute that differs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    /// Observed value (`null` when there is no prior state)
    pub before: Value,
    /// Declared value
    pub after: Value,
    /// Whether this change forces replacement
    pub force_new: bool,
}

/// Compare declared attributes against the declarable projection of the
/// observed state.
///
/// Computed attributes never diff. An optional+computed attribute is
/// skipped when either side is `null`: undeclared means "keep the remote
/// value" and unobserved means "unknown", neither of which is drift.
pub fn diff_attributes(schema: &Schema, declared: &Value, observed: &Value) -> Vec<AttributeChange> {
    let mut changes = Vec::new();

    for attr in schema.declarable() {
        let after = declared.get(attr.name).unwrap_or(&Value::Null);
        let before = observed.get(attr.name).unwrap_or(&Value::Null);

        if attr.mode == Mode::OptionalComputed && (after.is_null() || before.is_null()) {
            continue;
        }
        if before != after {
            changes.push(AttributeChange {
                name: attr.name.to_string(),
                before: before.clone(),
                after: after.clone(),
                force_new: attr.force_new,
            });
        }
    }

    changes
}

/// Decide how to converge an existing instance
///
/// Any force-new difference yields [`Action::Replace`], never an update.
pub fn classify(changes: &[AttributeChange]) -> Action {
    if changes.is_empty() {
        return Action::NoChange;
    }

    let forcing: Vec<String> = changes
        .iter()
        .filter(|c| c.force_new)
        .map(|c| c.name.clone())
        .collect();

    if forcing.is_empty() {
        Action::Update {
            fields: changes.iter().map(|c| c.name.clone()).collect(),
        }
    } else {
        Action::Replace { fields: forcing }
    }
}

/// A planned change for one instance, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub address: Address,
    pub action: Action,
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(self.action, Action::Create | Action::Recreate)
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(self.action, Action::Delete)
    }

    pub fn is_replacement(&self) -> bool {
        matches!(self.action, Action::Replace { .. })
    }

    /// Check if this diff represents an in-place modification
    pub fn is_modification(&self) -> bool {
        matches!(self.action, Action::Update { .. })
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of instances to add
    pub additions: usize,
    /// Number of instances to remove
    pub removals: usize,
    /// Number of instances to update in place
    pub modifications: usize,
    /// Number of instances to replace
    pub replacements: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else if diff.is_replacement() {
                summary.replacements += 1;
            } else if diff.is_modification() {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.replacements
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.address.kind.clone())
            .or_default()
            .push(diff);
    }
    groups
}
