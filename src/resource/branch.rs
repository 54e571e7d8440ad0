//! Repository branch resource (`gitlab_branch`)

use super::id;
use anyhow::{Context, Result};
use declarative::{Attribute, AttributeType, ReadOutcome, ResourceKind, Schema, StringSet};
use gitlab_client::{Branch, Client, Commit};
use serde::{Deserialize, Serialize};

pub const TYPE_NAME: &str = "gitlab_branch";

/// Declarable branch attributes. Every one of them is force-new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchConfig {
    pub name: String,
    pub project: String,
    /// Source ref; filled from the provider default when omitted
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Flattened commit at the branch head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSnapshot {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_date: String,
    pub committed_date: String,
    pub committer_name: String,
    pub committer_email: String,
    pub parent_ids: StringSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    pub id: String,
    pub name: String,
    pub project: String,
    /// Not observable remotely; `None` after an import
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub web_url: String,
    pub protected: bool,
    pub default: bool,
    pub can_push: bool,
    pub developer_can_push: bool,
    pub developer_can_merge: bool,
    pub merged: bool,
    /// Zero or one element
    pub commit: Vec<CommitSnapshot>,
}

/// Project a remote commit onto the nested list attribute.
///
/// Always returns a list, empty when the branch has no head commit.
pub fn flatten_commit(commit: Option<&Commit>) -> Vec<CommitSnapshot> {
    let Some(commit) = commit else {
        return Vec::new();
    };
    let date = |d: &Option<chrono::DateTime<chrono::FixedOffset>>| {
        d.map(|d| d.to_rfc3339()).unwrap_or_default()
    };

    vec![CommitSnapshot {
        id: commit.id.clone(),
        short_id: commit.short_id.clone(),
        title: commit.title.clone(),
        message: commit.message.clone(),
        author_name: commit.author_name.clone(),
        author_email: commit.author_email.clone(),
        authored_date: date(&commit.authored_date),
        committed_date: date(&commit.committed_date),
        committer_name: commit.committer_name.clone(),
        committer_email: commit.committer_email.clone(),
        parent_ids: commit.parent_ids.iter().cloned().collect(),
    }]
}

/// Merge a remote branch into state for `project`.
pub fn flatten_branch(
    project: &str,
    reference: Option<String>,
    branch: &Branch,
) -> Result<BranchState> {
    Ok(BranchState {
        id: id::encode(project, &branch.name)?,
        name: branch.name.clone(),
        project: project.to_string(),
        reference,
        web_url: branch.web_url.clone(),
        protected: branch.protected,
        default: branch.default,
        can_push: branch.can_push,
        developer_can_push: branch.developers_can_push,
        developer_can_merge: branch.developers_can_merge,
        merged: branch.merged,
        commit: flatten_commit(branch.commit.as_ref()),
    })
}

fn schema() -> Schema {
    let commit = "Head commit: id, short_id, title, message, author and committer \
                  name/email/date, parent_ids";
    Schema::new(
        TYPE_NAME,
        vec![
            Attribute::required("name", AttributeType::String)
                .force_new()
                .describe("Branch name"),
            Attribute::required("project", AttributeType::String)
                .force_new()
                .describe("Project ID or URL-encoded path"),
            Attribute::optional_computed("ref", AttributeType::String)
                .force_new()
                .default_value("provider default_ref")
                .describe("Branch name or commit SHA to create the branch from"),
            Attribute::computed("web_url", AttributeType::String),
            Attribute::computed("protected", AttributeType::Bool),
            Attribute::computed("default", AttributeType::Bool),
            Attribute::computed("can_push", AttributeType::Bool),
            Attribute::computed("developer_can_push", AttributeType::Bool),
            Attribute::computed("developer_can_merge", AttributeType::Bool),
            Attribute::computed("merged", AttributeType::Bool),
            Attribute::computed("commit", AttributeType::List).describe(commit),
        ],
    )
}

/// Branch lifecycle over one provider client
#[derive(Debug, Clone)]
pub struct BranchKind {
    client: Client,
    default_ref: String,
}

impl BranchKind {
    pub fn new(client: Client, default_ref: impl Into<String>) -> Self {
        Self {
            client,
            default_ref: default_ref.into(),
        }
    }

    fn fetch(
        &self,
        project: &str,
        name: &str,
        reference: Option<String>,
    ) -> Result<ReadOutcome<BranchState>> {
        match self.client.find_branch(project, name)? {
            Some(branch) => Ok(ReadOutcome::Found(flatten_branch(project, reference, &branch)?)),
            None => {
                log::debug!("Branch {name} not found in project {project}");
                Ok(ReadOutcome::Missing)
            }
        }
    }
}

impl ResourceKind for BranchKind {
    type Config = BranchConfig;
    type State = BranchState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn id(&self, state: &BranchState) -> String {
        state.id.clone()
    }

    fn normalize(&self, mut config: BranchConfig) -> BranchConfig {
        if config.reference.is_none() {
            config.reference = Some(self.default_ref.clone());
        }
        config
    }

    fn declared(&self, state: &BranchState) -> BranchConfig {
        BranchConfig {
            name: state.name.clone(),
            project: state.project.clone(),
            reference: state.reference.clone(),
        }
    }

    fn create(&self, config: &BranchConfig) -> Result<BranchState> {
        let reference = config
            .reference
            .clone()
            .unwrap_or_else(|| self.default_ref.clone());
        // Reject names the identifier cannot represent before touching the remote.
        id::encode(&config.project, &config.name)?;

        log::info!(
            "Creating branch {} in project {} from {}",
            config.name,
            config.project,
            reference
        );
        self.client
            .create_branch(&config.project, &config.name, &reference)
            .with_context(|| format!("Failed to create branch {}", config.name))?;

        // The create response is not authoritative; read the branch back.
        match self.fetch(&config.project, &config.name, Some(reference))? {
            ReadOutcome::Found(state) => Ok(state),
            ReadOutcome::Missing => anyhow::bail!(
                "Branch {} was created but project {} does not report it",
                config.name,
                config.project
            ),
        }
    }

    fn read(&self, id: &str, prior: Option<&BranchState>) -> Result<ReadOutcome<BranchState>> {
        let (project, name, reference) = match prior {
            Some(prior) => (
                prior.project.clone(),
                prior.name.clone(),
                prior.reference.clone(),
            ),
            None => {
                let (project, name) = id::decode(id)?;
                (project, name, None)
            }
        };
        log::debug!("Reading branch {name} in project {project}");
        self.fetch(&project, &name, reference)
    }

    fn delete(&self, state: &BranchState) -> Result<()> {
        log::info!("Deleting branch {} in project {}", state.name, state.project);
        self.client
            .delete_branch(&state.project, &state.name)
            .with_context(|| format!("Failed to delete branch {}", state.name))?;
        Ok(())
    }
}
