//! GitLab API resource representations and request payloads.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Branches
// =============================================================================

/// A commit as embedded in a branch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_email: String,
    pub authored_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub committer_name: String,
    #[serde(default)]
    pub committer_email: String,
    pub committed_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

/// A repository branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub developers_can_push: bool,
    #[serde(default)]
    pub developers_can_merge: bool,
    #[serde(default)]
    pub can_push: bool,
    #[serde(default)]
    pub web_url: String,
    pub commit: Option<Commit>,
}

/// Payload for `POST /projects/:id/repository/branches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateBranchOptions {
    pub branch: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

// =============================================================================
// Groups
// =============================================================================

/// Group visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Internal,
    Public,
}

/// Who may create projects in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCreationLevel {
    Noone,
    #[default]
    Maintainer,
    Developer,
}

/// Who may create subgroups in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgroupCreationLevel {
    #[default]
    Owner,
    Maintainer,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// API spelling of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(
                        "invalid {} {:?} (expected one of: {})",
                        stringify!($ty),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

string_enum!(Visibility {
    Private => "private",
    Internal => "internal",
    Public => "public",
});

string_enum!(ProjectCreationLevel {
    Noone => "noone",
    Maintainer => "maintainer",
    Developer => "developer",
});

string_enum!(SubgroupCreationLevel {
    Owner => "owner",
    Maintainer => "maintainer",
});

/// A GitLab group (namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub lfs_enabled: bool,
    #[serde(default)]
    pub request_access_enabled: bool,
    #[serde(default)]
    pub project_creation_level: ProjectCreationLevel,
    #[serde(default)]
    pub subgroup_creation_level: SubgroupCreationLevel,
    #[serde(default)]
    pub require_two_factor_authentication: bool,
    #[serde(default)]
    pub two_factor_grace_period: u32,
    /// GitLab returns `null` when the instance default applies.
    pub auto_devops_enabled: Option<bool>,
    pub emails_disabled: Option<bool>,
    pub mentions_disabled: Option<bool>,
    #[serde(default)]
    pub share_with_group_lock: bool,
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub web_url: String,
    /// Set once an asynchronous (delayed) deletion has been scheduled.
    pub marked_for_deletion_on: Option<NaiveDate>,
}

impl Group {
    /// Whether GitLab has scheduled this group for deletion.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion_on.is_some()
    }
}

/// Mutable group settings, shared by create and update payloads.
///
/// Unset fields are omitted from the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lfs_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_access_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_creation_level: Option<ProjectCreationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgroup_creation_level: Option<SubgroupCreationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_two_factor_authentication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor_grace_period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_devops_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_with_group_lock: Option<bool>,
}

impl GroupSettings {
    /// True when no setting would be sent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Payload for `POST /groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateGroupOptions {
    #[serde(flatten)]
    pub settings: GroupSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

/// Payload for `PUT /groups/:id`. The parent cannot be changed here.
pub type UpdateGroupOptions = GroupSettings;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_deserializes_gitlab_payload() {
        let json = r#"{
            "name": "testbranch-1",
            "merged": false,
            "protected": false,
            "default": false,
            "developers_can_push": false,
            "developers_can_merge": false,
            "can_push": true,
            "web_url": "https://gitlab.example.com/g/p/-/tree/testbranch-1",
            "commit": {
                "id": "7b5c3cc8be40ee161ae89a06bba6229da1032a0c",
                "short_id": "7b5c3cc",
                "title": "add projects API",
                "message": "add projects API",
                "author_name": "John Smith",
                "author_email": "john@example.com",
                "authored_date": "2012-06-27T05:51:39.000-07:00",
                "committer_name": "John Smith",
                "committer_email": "john@example.com",
                "committed_date": "2012-06-28T03:44:20.000-07:00",
                "parent_ids": ["4ad91d3c1144c406e50c7b33bae684bd6837faf8"]
            }
        }"#;

        let branch: Branch = serde_json::from_str(json).unwrap();
        assert_eq!(branch.name, "testbranch-1");
        assert!(branch.can_push);
        let commit = branch.commit.unwrap();
        assert_eq!(commit.short_id, "7b5c3cc");
        assert_eq!(commit.parent_ids.len(), 1);
        assert!(commit.authored_date.is_some());
    }

    #[test]
    fn test_branch_without_commit() {
        let branch: Branch = serde_json::from_str(r#"{"name": "empty", "commit": null}"#).unwrap();
        assert!(branch.commit.is_none());
        assert!(!branch.protected);
    }

    #[test]
    fn test_group_deletion_marker() {
        let json = r#"{
            "id": 7, "name": "foo", "path": "foo",
            "visibility": "public",
            "project_creation_level": "developer",
            "subgroup_creation_level": "maintainer",
            "auto_devops_enabled": null,
            "parent_id": null,
            "full_path": "foo",
            "marked_for_deletion_on": "2024-03-01"
        }"#;

        let group: Group = serde_json::from_str(json).unwrap();
        assert_eq!(group.visibility, Visibility::Public);
        assert_eq!(group.project_creation_level, ProjectCreationLevel::Developer);
        assert_eq!(group.subgroup_creation_level, SubgroupCreationLevel::Maintainer);
        assert!(group.auto_devops_enabled.is_none());
        assert!(group.is_marked_for_deletion());
    }

    #[test]
    fn test_create_group_options_skip_unset() {
        let options = CreateGroupOptions {
            settings: GroupSettings {
                name: Some("foo".to_string()),
                path: Some("foo".to_string()),
                lfs_enabled: Some(false),
                ..Default::default()
            },
            parent_id: Some(3),
        };

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "foo", "path": "foo", "lfs_enabled": false, "parent_id": 3})
        );
    }

    #[test]
    fn test_create_branch_options_uses_ref_key() {
        let options = CreateBranchOptions {
            branch: "feature".to_string(),
            reference: "main".to_string(),
        };
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value, serde_json::json!({"branch": "feature", "ref": "main"}));
    }

    #[test]
    fn test_string_enums() {
        assert_eq!("internal".parse::<Visibility>().unwrap(), Visibility::Internal);
        assert_eq!(ProjectCreationLevel::Noone.to_string(), "noone");
        assert!("admin".parse::<SubgroupCreationLevel>().is_err());
        assert!(GroupSettings::default().is_empty());
    }
}
