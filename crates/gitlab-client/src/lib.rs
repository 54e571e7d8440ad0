//! # gitlab-client
//!
//! Blocking GitLab REST v4 client covering repository branches and groups.
//!
//! Every lookup distinguishes an absent resource from other failures, and
//! group deletion waits (bounded) for GitLab's asynchronous removal to
//! become visible before reporting success.
//!
//! ## Example
//!
//! ```
//! use gitlab_client::{Client, MockApi};
//! use std::sync::Arc;
//!
//! let mock = MockApi::new();
//! mock.add_project("42");
//!
//! let client = Client::with_backend(Arc::new(mock));
//! let branch = client.create_branch("42", "feature", "main").unwrap();
//! assert_eq!(branch.name, "feature");
//!
//! client.delete_branch("42", "feature").unwrap();
//! assert!(client.find_branch("42", "feature").unwrap().is_none());
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod poll;
pub mod types;

pub use backend::http::{DEFAULT_BASE_URL, HttpApi};
pub use backend::{Api, DeletionMode, MockApi};
pub use error::{Error, ErrorCategory, Result};
pub use poll::{Observation, PollConfig};
pub use types::{
    Branch, Commit, CreateBranchOptions, CreateGroupOptions, Group, GroupSettings,
    ProjectCreationLevel, SubgroupCreationLevel, UpdateGroupOptions, Visibility,
};

use poll::{LogCallback, PollCallback};
use std::sync::Arc;
use std::time::Duration;

/// Connection settings for [`Client::new`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://gitlab.com/api/v4`.
    pub base_url: String,
    /// Access token sent as `PRIVATE-TOKEN`.
    pub token: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// How long to wait for group deletions to become visible.
    pub deletion: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
            deletion: PollConfig::default(),
        }
    }
}

/// High-level client for branch and group operations.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct Client {
    api: Arc<dyn Api>,
    deletion: PollConfig,
}

impl Client {
    /// Create a client talking to a real GitLab instance.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let api = HttpApi::new(
            config.base_url.clone(),
            config.token.clone(),
            config.request_timeout,
        );
        Self {
            api: Arc::new(api),
            deletion: config.deletion,
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(api: Arc<dyn Api>) -> Self {
        Self {
            api,
            deletion: PollConfig::default(),
        }
    }

    /// Override the deletion polling settings.
    pub fn with_deletion_poll(mut self, config: PollConfig) -> Self {
        self.deletion = config;
        self
    }

    /// Get the underlying backend.
    pub fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    /// Get the deletion polling settings.
    pub fn deletion_poll(&self) -> &PollConfig {
        &self.deletion
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Create `name` in `project` from `reference`.
    pub fn create_branch(&self, project: &str, name: &str, reference: &str) -> Result<Branch> {
        let options = CreateBranchOptions {
            branch: name.to_string(),
            reference: reference.to_string(),
        };
        self.api.create_branch(project, &options)
    }

    /// Look up a branch, returning `None` when it does not exist.
    pub fn find_branch(&self, project: &str, name: &str) -> Result<Option<Branch>> {
        match self.api.get_branch(project, name) {
            Ok(branch) => Ok(Some(branch)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a branch.
    pub fn delete_branch(&self, project: &str, name: &str) -> Result<()> {
        self.api.delete_branch(project, name)
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Create a group.
    pub fn create_group(&self, options: &CreateGroupOptions) -> Result<Group> {
        self.api.create_group(options)
    }

    /// Look up a group by numeric ID or full path, returning `None` when it
    /// does not exist.
    pub fn find_group(&self, id: &str) -> Result<Option<Group>> {
        match self.api.get_group(id) {
            Ok(group) => Ok(Some(group)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update a group's settings.
    pub fn update_group(&self, id: u64, options: &UpdateGroupOptions) -> Result<Group> {
        self.api.update_group(id, options)
    }

    /// Delete a group and wait until GitLab reports it gone or marked for
    /// deletion.
    ///
    /// Returns [`Error::DeadlineExceeded`] when the group is still fully
    /// live once the deletion deadline elapses.
    pub fn delete_group(&self, id: u64) -> Result<Observation> {
        self.api.delete_group(id)?;

        let key = id.to_string();
        let what = format!("group {id}");
        let callback: &dyn PollCallback = &LogCallback;
        poll::wait_for_deletion(&self.deletion, &what, Some(callback), || {
            match self.api.get_group(&key) {
                Ok(group) if group.is_marked_for_deletion() => Ok(Observation::MarkedForDeletion),
                Ok(_) => Ok(Observation::Present),
                Err(e) if e.is_not_found() => Ok(Observation::Gone),
                Err(e) => Err(e),
            }
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("deletion", &self.deletion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mock: &MockApi) -> Client {
        Client::with_backend(Arc::new(mock.clone()))
            .with_deletion_poll(
                PollConfig::with_timeout(Duration::from_millis(100))
                    .interval(Duration::from_millis(1)),
            )
    }

    fn create_foo(client: &Client) -> Group {
        client
            .create_group(&CreateGroupOptions {
                settings: GroupSettings {
                    name: Some("foo".to_string()),
                    path: Some("foo".to_string()),
                    ..Default::default()
                },
                parent_id: None,
            })
            .unwrap()
    }

    #[test]
    fn test_find_branch_missing_is_none() {
        let mock = MockApi::new();
        mock.add_project("42");
        let client = client(&mock);
        assert!(client.find_branch("42", "nope").unwrap().is_none());
        assert!(client.find_branch("42", "main").unwrap().is_some());
    }

    #[test]
    fn test_find_branch_propagates_other_errors() {
        let mock = MockApi::new();
        mock.fail("get_branch", 403);
        let err = client(&mock).find_branch("42", "main").unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_delete_group_immediate() {
        let mock = MockApi::new();
        let client = client(&mock);
        let group = create_foo(&client);
        assert_eq!(client.delete_group(group.id).unwrap(), Observation::Gone);
        assert!(client.find_group("foo").unwrap().is_none());
    }

    #[test]
    fn test_delete_group_waits_for_lingering_read() {
        let mock = MockApi::new();
        let client = client(&mock);
        let group = create_foo(&client);
        mock.set_deletion_mode(DeletionMode::LingerThenGone { reads: 3 });

        assert_eq!(client.delete_group(group.id).unwrap(), Observation::Gone);
        assert_eq!(mock.call_count("get_group"), 4);
    }

    #[test]
    fn test_delete_group_accepts_deletion_marker() {
        let mock = MockApi::new();
        let client = client(&mock);
        let group = create_foo(&client);
        mock.set_deletion_mode(DeletionMode::LingerThenMark { reads: 2 });

        assert_eq!(
            client.delete_group(group.id).unwrap(),
            Observation::MarkedForDeletion
        );
    }

    #[test]
    fn test_delete_group_deadline_exceeded() {
        let mock = MockApi::new();
        let client = client(&mock);
        let group = create_foo(&client);
        mock.set_deletion_mode(DeletionMode::Never);

        let err = client.delete_group(group.id).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.to_string().contains(&format!("group {}", group.id)));
    }

    #[test]
    fn test_delete_group_rejected_skips_polling() {
        let mock = MockApi::new();
        let client = client(&mock);
        let group = create_foo(&client);
        mock.fail("delete_group", 403);

        assert!(client.delete_group(group.id).is_err());
        assert_eq!(mock.call_count("get_group"), 0);
    }

    #[test]
    fn test_default_config_targets_gitlab_com() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://gitlab.com/api/v4");
        assert_eq!(config.deletion.timeout, Duration::from_secs(15));
    }
}
