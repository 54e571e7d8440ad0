//! Group resource (`gitlab_group`)
//!
//! Groups are updated in place except for `parent_id`. Deleting a group
//! waits for GitLab's asynchronous removal, see
//! [`gitlab_client::Client::delete_group`].

use anyhow::{Context, Result, bail};
use declarative::{Attribute, AttributeType, ReadOutcome, ResourceKind, Schema};
use gitlab_client::{
    Client, CreateGroupOptions, Group, GroupSettings, Observation, ProjectCreationLevel,
    SubgroupCreationLevel, UpdateGroupOptions, Visibility,
};
use serde::{Deserialize, Serialize};

pub const TYPE_NAME: &str = "gitlab_group";

const VISIBILITY: &[&str] = &["private", "internal", "public"];
const PROJECT_CREATION: &[&str] = &["noone", "maintainer", "developer"];
const SUBGROUP_CREATION: &[&str] = &["owner", "maintainer"];

fn default_true() -> bool {
    true
}

fn default_grace_period() -> u32 {
    48
}

/// Declarable group attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    /// Parent group for subgroups; changing it recreates the group
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Left to the instance default when omitted
    #[serde(default)]
    pub visibility_level: Option<Visibility>,
    #[serde(default = "default_true")]
    pub lfs_enabled: bool,
    #[serde(default)]
    pub request_access_enabled: bool,
    #[serde(default)]
    pub project_creation_level: ProjectCreationLevel,
    #[serde(default)]
    pub subgroup_creation_level: SubgroupCreationLevel,
    #[serde(default)]
    pub require_two_factor_authentication: bool,
    #[serde(default = "default_grace_period")]
    pub two_factor_grace_period: u32,
    #[serde(default)]
    pub auto_devops_enabled: bool,
    #[serde(default)]
    pub emails_disabled: bool,
    #[serde(default)]
    pub mentions_disabled: bool,
    #[serde(default)]
    pub share_with_group_lock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub description: String,
    pub parent_id: Option<u64>,
    pub visibility_level: Visibility,
    pub lfs_enabled: bool,
    pub request_access_enabled: bool,
    pub project_creation_level: ProjectCreationLevel,
    pub subgroup_creation_level: SubgroupCreationLevel,
    pub require_two_factor_authentication: bool,
    pub two_factor_grace_period: u32,
    pub auto_devops_enabled: bool,
    pub emails_disabled: bool,
    pub mentions_disabled: bool,
    pub share_with_group_lock: bool,
    pub full_path: String,
    pub full_name: String,
    pub web_url: String,
}

impl From<&Group> for GroupState {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            path: group.path.clone(),
            description: group.description.clone(),
            parent_id: group.parent_id,
            visibility_level: group.visibility,
            lfs_enabled: group.lfs_enabled,
            request_access_enabled: group.request_access_enabled,
            project_creation_level: group.project_creation_level,
            subgroup_creation_level: group.subgroup_creation_level,
            require_two_factor_authentication: group.require_two_factor_authentication,
            two_factor_grace_period: group.two_factor_grace_period,
            // null means the instance default, which is off
            auto_devops_enabled: group.auto_devops_enabled.unwrap_or(false),
            emails_disabled: group.emails_disabled.unwrap_or(false),
            mentions_disabled: group.mentions_disabled.unwrap_or(false),
            share_with_group_lock: group.share_with_group_lock,
            full_path: group.full_path.clone(),
            full_name: group.full_name.clone(),
            web_url: group.web_url.clone(),
        }
    }
}

/// Payload creating the declared group; every declared setting is sent.
pub fn create_options(config: &GroupConfig) -> CreateGroupOptions {
    CreateGroupOptions {
        settings: GroupSettings {
            name: Some(config.name.clone()),
            path: Some(config.path.clone()),
            description: Some(config.description.clone()),
            visibility: config.visibility_level,
            lfs_enabled: Some(config.lfs_enabled),
            request_access_enabled: Some(config.request_access_enabled),
            project_creation_level: Some(config.project_creation_level),
            subgroup_creation_level: Some(config.subgroup_creation_level),
            require_two_factor_authentication: Some(config.require_two_factor_authentication),
            two_factor_grace_period: Some(config.two_factor_grace_period),
            auto_devops_enabled: Some(config.auto_devops_enabled),
            emails_disabled: Some(config.emails_disabled),
            mentions_disabled: Some(config.mentions_disabled),
            share_with_group_lock: Some(config.share_with_group_lock),
        },
        parent_id: config.parent_id,
    }
}

/// Payload carrying only the `changed` attributes.
///
/// Fails for attributes that cannot change in place.
pub fn update_options(config: &GroupConfig, changed: &[String]) -> Result<UpdateGroupOptions> {
    let mut options = UpdateGroupOptions::default();
    for field in changed {
        match field.as_str() {
            "name" => options.name = Some(config.name.clone()),
            "path" => options.path = Some(config.path.clone()),
            "description" => options.description = Some(config.description.clone()),
            "visibility_level" => options.visibility = config.visibility_level,
            "lfs_enabled" => options.lfs_enabled = Some(config.lfs_enabled),
            "request_access_enabled" => {
                options.request_access_enabled = Some(config.request_access_enabled);
            }
            "project_creation_level" => {
                options.project_creation_level = Some(config.project_creation_level);
            }
            "subgroup_creation_level" => {
                options.subgroup_creation_level = Some(config.subgroup_creation_level);
            }
            "require_two_factor_authentication" => {
                options.require_two_factor_authentication =
                    Some(config.require_two_factor_authentication);
            }
            "two_factor_grace_period" => {
                options.two_factor_grace_period = Some(config.two_factor_grace_period);
            }
            "auto_devops_enabled" => options.auto_devops_enabled = Some(config.auto_devops_enabled),
            "emails_disabled" => options.emails_disabled = Some(config.emails_disabled),
            "mentions_disabled" => options.mentions_disabled = Some(config.mentions_disabled),
            "share_with_group_lock" => {
                options.share_with_group_lock = Some(config.share_with_group_lock);
            }
            other => bail!("{TYPE_NAME} attribute '{other}' cannot be updated in place"),
        }
    }
    Ok(options)
}

fn schema() -> Schema {
    Schema::new(
        TYPE_NAME,
        vec![
            Attribute::required("name", AttributeType::String),
            Attribute::required("path", AttributeType::String),
            Attribute::optional("description", AttributeType::String).default_value("\"\""),
            Attribute::optional("parent_id", AttributeType::Int)
                .force_new()
                .describe("Parent group ID; set to create a subgroup"),
            Attribute::optional_computed("visibility_level", AttributeType::Enum(VISIBILITY)),
            Attribute::optional("lfs_enabled", AttributeType::Bool).default_value(true),
            Attribute::optional("request_access_enabled", AttributeType::Bool).default_value(false),
            Attribute::optional("project_creation_level", AttributeType::Enum(PROJECT_CREATION))
                .default_value(ProjectCreationLevel::default()),
            Attribute::optional("subgroup_creation_level", AttributeType::Enum(SUBGROUP_CREATION))
                .default_value(SubgroupCreationLevel::default()),
            Attribute::optional("require_two_factor_authentication", AttributeType::Bool)
                .default_value(false),
            Attribute::optional("two_factor_grace_period", AttributeType::Int)
                .default_value(default_grace_period())
                .describe("Hours users may delay two-factor setup"),
            Attribute::optional("auto_devops_enabled", AttributeType::Bool).default_value(false),
            Attribute::optional("emails_disabled", AttributeType::Bool).default_value(false),
            Attribute::optional("mentions_disabled", AttributeType::Bool).default_value(false),
            Attribute::optional("share_with_group_lock", AttributeType::Bool).default_value(false),
            Attribute::computed("full_path", AttributeType::String),
            Attribute::computed("full_name", AttributeType::String),
            Attribute::computed("web_url", AttributeType::String),
        ],
    )
}

/// Group lifecycle over one provider client
#[derive(Debug, Clone)]
pub struct GroupKind {
    client: Client,
}

impl GroupKind {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn fetch(&self, id: &str) -> Result<ReadOutcome<GroupState>> {
        match self.client.find_group(id)? {
            Some(group) if group.is_marked_for_deletion() => {
                log::info!("Group {id} is pending deletion, treating it as gone");
                Ok(ReadOutcome::Missing)
            }
            Some(group) => Ok(ReadOutcome::Found(GroupState::from(&group))),
            None => {
                log::debug!("Group {id} not found");
                Ok(ReadOutcome::Missing)
            }
        }
    }

    fn read_back(&self, id: u64) -> Result<GroupState> {
        match self.fetch(&id.to_string())? {
            ReadOutcome::Found(state) => Ok(state),
            ReadOutcome::Missing => bail!("Group {id} disappeared while it was being reconciled"),
        }
    }
}

impl ResourceKind for GroupKind {
    type Config = GroupConfig;
    type State = GroupState;

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn id(&self, state: &GroupState) -> String {
        state.id.to_string()
    }

    fn declared(&self, state: &GroupState) -> GroupConfig {
        GroupConfig {
            name: state.name.clone(),
            path: state.path.clone(),
            description: state.description.clone(),
            parent_id: state.parent_id,
            visibility_level: Some(state.visibility_level),
            lfs_enabled: state.lfs_enabled,
            request_access_enabled: state.request_access_enabled,
            project_creation_level: state.project_creation_level,
            subgroup_creation_level: state.subgroup_creation_level,
            require_two_factor_authentication: state.require_two_factor_authentication,
            two_factor_grace_period: state.two_factor_grace_period,
            auto_devops_enabled: state.auto_devops_enabled,
            emails_disabled: state.emails_disabled,
            mentions_disabled: state.mentions_disabled,
            share_with_group_lock: state.share_with_group_lock,
        }
    }

    fn create(&self, config: &GroupConfig) -> Result<GroupState> {
        log::info!("Creating group {} ({})", config.name, config.path);
        let group = self
            .client
            .create_group(&create_options(config))
            .with_context(|| format!("Failed to create group {}", config.path))?;
        log::debug!("Created group {} with ID {}", group.full_path, group.id);
        self.read_back(group.id)
    }

    fn read(&self, id: &str, _prior: Option<&GroupState>) -> Result<ReadOutcome<GroupState>> {
        log::debug!("Reading group {id}");
        self.fetch(id)
    }

    fn update(
        &self,
        state: &GroupState,
        config: &GroupConfig,
        changed: &[String],
    ) -> Result<GroupState> {
        let options = update_options(config, changed)?;
        if options.is_empty() {
            return self.read_back(state.id);
        }

        log::info!("Updating group {} ({})", state.full_path, changed.join(", "));
        self.client
            .update_group(state.id, &options)
            .with_context(|| format!("Failed to update group {}", state.full_path))?;
        self.read_back(state.id)
    }

    fn delete(&self, state: &GroupState) -> Result<()> {
        log::info!("Deleting group {}", state.full_path);
        let observed = self
            .client
            .delete_group(state.id)
            .with_context(|| format!("Failed to delete group {}", state.full_path))?;
        if observed == Observation::MarkedForDeletion {
            log::info!("Group {} is scheduled for deletion", state.full_path);
        }
        Ok(())
    }
}
