//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Address of a declared instance: `<type>.<name>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Resource type, e.g. `gitlab_branch`
    #[serde(rename = "type")]
    pub kind: String,
    /// Instance name chosen by the user
    pub name: String,
}

impl Address {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Error parsing an [`Address`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {0:?} (expected <type>.<name>)")]
pub struct AddressError(pub String);

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => Ok(Self::new(kind, name)),
            _ => Err(AddressError(s.to_string())),
        }
    }
}

/// Recorded state of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Remote identifier
    pub id: String,
    /// Full attribute set, computed attributes included
    pub attributes: Value,
}

/// Tracked instances keyed by address
pub type Tracked = BTreeMap<Address, Record>;

/// Outcome of reading an instance from the remote side
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<T> {
    /// The instance exists
    Found(T),
    /// The instance is gone; it should be dropped from state
    Missing,
}

impl<T> ReadOutcome<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadOutcome<U> {
        match self {
            Self::Found(v) => ReadOutcome::Found(f(v)),
            Self::Missing => ReadOutcome::Missing,
        }
    }
}

/// Planned action for one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Declared with no prior state
    Create,
    /// Tracked, but the remote side no longer has it
    Recreate,
    /// In-place update of the listed attributes
    Update { fields: Vec<String> },
    /// Delete then create, forced by the listed attributes
    Replace { fields: Vec<String> },
    /// Tracked but no longer declared
    Delete,
    NoChange,
}

impl Action {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }

    /// Plan symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Create | Self::Recreate => "+",
            Self::Update { .. } => "~",
            Self::Replace { .. } => "-/+",
            Self::Delete => "-",
            Self::NoChange => " ",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Recreate => write!(f, "create (missing remotely)"),
            Self::Update { fields } => write!(f, "update in place ({})", fields.join(", ")),
            Self::Replace { fields } => write!(f, "replace ({})", fields.join(", ")),
            Self::Delete => write!(f, "destroy"),
            Self::NoChange => write!(f, "no change"),
        }
    }
}

/// Result of applying one planned action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Instance was created
    Created,
    /// Instance was updated in place
    Modified,
    /// Instance was deleted and created again
    Replaced,
    /// Instance was deleted
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Modified | Self::Replaced | Self::Removed
        )
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub replaced: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.replaced + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of instances processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.replaced += other.replaced;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Replaced => self.replaced += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trip() {
        let addr: Address = "gitlab_branch.feature".parse().unwrap();
        assert_eq!(addr.kind, "gitlab_branch");
        assert_eq!(addr.name, "feature");
        assert_eq!(addr.to_string(), "gitlab_branch.feature");
    }

    #[test]
    fn test_address_name_may_contain_dots() {
        let addr: Address = "gitlab_group.a.b".parse().unwrap();
        assert_eq!(addr.name, "a.b");
    }

    #[test]
    fn test_address_rejects_bare_type() {
        assert!("gitlab_group".parse::<Address>().is_err());
        assert!(".foo".parse::<Address>().is_err());
        assert!("gitlab_group.".parse::<Address>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Replaced);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".into(),
        });
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.total(), 3);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_action_display() {
        let action = Action::Replace {
            fields: vec!["ref".into()],
        };
        assert_eq!(action.to_string(), "replace (ref)");
        assert_eq!(action.symbol(), "-/+");
        assert!(!Action::NoChange.is_change());
    }

    #[test]
    fn test_read_outcome_helpers() {
        let found = ReadOutcome::Found(2).map(|n| n * 2);
        assert_eq!(found.found(), Some(4));
        assert!(ReadOutcome::<u8>::Missing.is_missing());
    }
}
