//! Backend trait and implementations for the GitLab REST API.
//!
//! [`http::HttpApi`] talks to a real instance over HTTPS. [`MockApi`] keeps
//! projects, branches and groups in memory and can simulate GitLab's
//! asynchronous group deletion:
//!
//! ```
//! use gitlab_client::backend::{Api, DeletionMode, MockApi};
//!
//! let mock = MockApi::new();
//! mock.add_project("42");
//! mock.set_deletion_mode(DeletionMode::LingerThenMark { reads: 2 });
//!
//! let branch = mock.get_branch("42", "main").unwrap();
//! assert!(branch.commit.is_some());
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{
    Branch, Commit, CreateBranchOptions, CreateGroupOptions, Group, GroupSettings,
    UpdateGroupOptions,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Remote operations consumed by the resource reconcilers.
///
/// Absent resources are reported as [`Error::NotFound`] so callers can
/// tell them apart from every other failure.
pub trait Api: Send + Sync {
    /// Create a branch from a ref.
    fn create_branch(&self, project: &str, options: &CreateBranchOptions) -> Result<Branch>;

    /// Fetch a single branch.
    fn get_branch(&self, project: &str, name: &str) -> Result<Branch>;

    /// Delete a branch.
    fn delete_branch(&self, project: &str, name: &str) -> Result<()>;

    /// Create a group (or subgroup when `parent_id` is set).
    fn create_group(&self, options: &CreateGroupOptions) -> Result<Group>;

    /// Fetch a group by numeric ID or full path.
    fn get_group(&self, id: &str) -> Result<Group>;

    /// Update a group's settings.
    fn update_group(&self, id: u64, options: &UpdateGroupOptions) -> Result<Group>;

    /// Request deletion of a group. GitLab may complete it asynchronously.
    fn delete_group(&self, id: u64) -> Result<()>;
}

/// How [`MockApi`] behaves after a group delete call succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionMode {
    /// The group disappears immediately.
    #[default]
    Immediate,
    /// The group stays fully visible for `reads` lookups, then 404s.
    LingerThenGone { reads: u32 },
    /// The group stays fully visible for `reads` lookups, then carries a deletion marker.
    LingerThenMark { reads: u32 },
    /// The group never goes away and is never marked.
    Never,
}

#[derive(Debug, Default)]
struct MockState {
    projects: HashMap<String, BTreeMap<String, Branch>>,
    groups: BTreeMap<u64, Group>,
    next_group_id: u64,
    deletion_mode: DeletionMode,
    /// Remaining live reads for groups whose deletion is pending.
    pending_deletions: HashMap<u64, u32>,
    failures: HashMap<&'static str, u16>,
    calls: Vec<String>,
}

/// In-memory backend for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    /// Create an empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a project seeded with `main` and `master` branches.
    pub fn add_project(&self, project: &str) {
        let mut state = self.lock();
        let branches = state.projects.entry(project.to_string()).or_default();
        for name in ["main", "master"] {
            branches
                .entry(name.to_string())
                .or_insert_with(|| seed_branch(project, name));
        }
    }

    /// Insert or replace a group, returning its ID.
    pub fn insert_group(&self, mut group: Group) -> u64 {
        let mut state = self.lock();
        if group.id == 0 {
            state.next_group_id += 1;
            group.id = state.next_group_id;
        } else {
            state.next_group_id = state.next_group_id.max(group.id);
        }
        let id = group.id;
        state.groups.insert(id, group);
        id
    }

    /// Remove a group out of band, as if someone deleted it in the UI.
    pub fn remove_group(&self, id: u64) {
        self.lock().groups.remove(&id);
    }

    /// Remove a branch out of band.
    pub fn remove_branch(&self, project: &str, name: &str) {
        if let Some(branches) = self.lock().projects.get_mut(project) {
            branches.remove(name);
        }
    }

    /// Configure how group deletions play out.
    pub fn set_deletion_mode(&self, mode: DeletionMode) {
        self.lock().deletion_mode = mode;
    }

    /// Make every call to `operation` fail with `status`.
    pub fn fail(&self, operation: &'static str, status: u16) {
        self.lock().failures.insert(operation, status);
    }

    /// Names of the operations called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        if let Some(status) = state.failures.get(operation) {
            return Err(Error::Api {
                status: *status,
                message: format!("mock failure in {operation}"),
            });
        }
        Ok(state)
    }
}

impl MockState {
    fn find_group_id(&self, id: &str) -> Option<u64> {
        match id.parse::<u64>() {
            Ok(n) => self.groups.contains_key(&n).then_some(n),
            Err(_) => self
                .groups
                .values()
                .find(|g| g.full_path == id)
                .map(|g| g.id),
        }
    }

    fn full_path_for(&self, parent_id: Option<u64>, path: &str) -> Result<String> {
        match parent_id {
            None => Ok(path.to_string()),
            Some(pid) => self
                .groups
                .get(&pid)
                .map(|parent| format!("{}/{}", parent.full_path, path))
                .ok_or_else(|| Error::not_found(format!("parent group {pid}"))),
        }
    }
}

fn seed_commit(project: &str, name: &str) -> Commit {
    let mut hasher = DefaultHasher::new();
    (project, name).hash(&mut hasher);
    let digest = hasher.finish();
    let id = format!("{digest:016x}{digest:016x}{:08x}", digest >> 32);
    let date = DateTime::<Utc>::UNIX_EPOCH.fixed_offset();
    Commit {
        short_id: id[..8].to_string(),
        id,
        title: format!("Initial commit on {name}"),
        message: format!("Initial commit on {name}\n"),
        author_name: "Mock Author".to_string(),
        author_email: "author@example.com".to_string(),
        authored_date: Some(date),
        committer_name: "Mock Committer".to_string(),
        committer_email: "committer@example.com".to_string(),
        committed_date: Some(date),
        parent_ids: Vec::new(),
    }
}

fn seed_branch(project: &str, name: &str) -> Branch {
    Branch {
        name: name.to_string(),
        merged: false,
        protected: name == "main" || name == "master",
        default: name == "main",
        developers_can_push: false,
        developers_can_merge: false,
        can_push: true,
        web_url: format!("https://gitlab.example.com/{project}/-/tree/{name}"),
        commit: Some(seed_commit(project, name)),
    }
}

fn apply_settings(group: &mut Group, settings: &GroupSettings) {
    if let Some(v) = &settings.name {
        group.name.clone_from(v);
    }
    if let Some(v) = &settings.path {
        group.path.clone_from(v);
    }
    if let Some(v) = &settings.description {
        group.description.clone_from(v);
    }
    if let Some(v) = settings.visibility {
        group.visibility = v;
    }
    if let Some(v) = settings.lfs_enabled {
        group.lfs_enabled = v;
    }
    if let Some(v) = settings.request_access_enabled {
        group.request_access_enabled = v;
    }
    if let Some(v) = settings.project_creation_level {
        group.project_creation_level = v;
    }
    if let Some(v) = settings.subgroup_creation_level {
        group.subgroup_creation_level = v;
    }
    if let Some(v) = settings.require_two_factor_authentication {
        group.require_two_factor_authentication = v;
    }
    if let Some(v) = settings.two_factor_grace_period {
        group.two_factor_grace_period = v;
    }
    if let Some(v) = settings.auto_devops_enabled {
        group.auto_devops_enabled = Some(v);
    }
    if let Some(v) = settings.emails_disabled {
        group.emails_disabled = Some(v);
    }
    if let Some(v) = settings.mentions_disabled {
        group.mentions_disabled = Some(v);
    }
    if let Some(v) = settings.share_with_group_lock {
        group.share_with_group_lock = v;
    }
}

impl Api for MockApi {
    fn create_branch(&self, project: &str, options: &CreateBranchOptions) -> Result<Branch> {
        let mut state = self.enter("create_branch")?;
        let branches = state
            .projects
            .get_mut(project)
            .ok_or_else(|| Error::not_found(format!("project {project}")))?;

        if branches.contains_key(&options.branch) {
            return Err(Error::Api {
                status: 400,
                message: "Branch already exists".to_string(),
            });
        }
        let source = branches.get(&options.reference).ok_or_else(|| Error::Api {
            status: 400,
            message: "Invalid reference name".to_string(),
        })?;

        let branch = Branch {
            name: options.branch.clone(),
            merged: false,
            protected: false,
            default: false,
            developers_can_push: false,
            developers_can_merge: false,
            can_push: true,
            web_url: format!(
                "https://gitlab.example.com/{project}/-/tree/{}",
                options.branch
            ),
            commit: source.commit.clone(),
        };
        branches.insert(options.branch.clone(), branch.clone());
        Ok(branch)
    }

    fn get_branch(&self, project: &str, name: &str) -> Result<Branch> {
        let state = self.enter("get_branch")?;
        state
            .projects
            .get(project)
            .and_then(|branches| branches.get(name))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("branch {name} in project {project}")))
    }

    fn delete_branch(&self, project: &str, name: &str) -> Result<()> {
        let mut state = self.enter("delete_branch")?;
        state
            .projects
            .get_mut(project)
            .and_then(|branches| branches.remove(name))
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("branch {name} in project {project}")))
    }

    fn create_group(&self, options: &CreateGroupOptions) -> Result<Group> {
        let mut state = self.enter("create_group")?;
        let settings = &options.settings;
        let (Some(name), Some(path)) = (&settings.name, &settings.path) else {
            return Err(Error::Api {
                status: 400,
                message: "name and path are required".to_string(),
            });
        };

        let full_path = state.full_path_for(options.parent_id, path)?;
        if state.groups.values().any(|g| g.full_path == full_path) {
            return Err(Error::Api {
                status: 400,
                message: format!("Failed to save group {{:path=>[\"{path} has already been taken\"]}}"),
            });
        }

        state.next_group_id += 1;
        let mut group = Group {
            id: state.next_group_id,
            name: name.clone(),
            path: path.clone(),
            description: String::new(),
            visibility: Default::default(),
            lfs_enabled: true,
            request_access_enabled: false,
            project_creation_level: Default::default(),
            subgroup_creation_level: Default::default(),
            require_two_factor_authentication: false,
            two_factor_grace_period: 48,
            auto_devops_enabled: None,
            emails_disabled: None,
            mentions_disabled: None,
            share_with_group_lock: false,
            parent_id: options.parent_id,
            web_url: format!("https://gitlab.example.com/groups/{full_path}"),
            full_name: name.clone(),
            full_path,
            marked_for_deletion_on: None,
        };
        apply_settings(&mut group, settings);
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn get_group(&self, id: &str) -> Result<Group> {
        let mut state = self.enter("get_group")?;
        let gid = state
            .find_group_id(id)
            .ok_or_else(|| Error::not_found(format!("group {id}")))?;

        if let Some(remaining) = state.pending_deletions.get(&gid).copied() {
            if remaining > 0 {
                state.pending_deletions.insert(gid, remaining - 1);
            } else {
                state.pending_deletions.remove(&gid);
                match state.deletion_mode {
                    DeletionMode::LingerThenMark { .. } => {
                        if let Some(group) = state.groups.get_mut(&gid) {
                            group.marked_for_deletion_on = Some(Utc::now().date_naive());
                        }
                    }
                    _ => {
                        state.groups.remove(&gid);
                        return Err(Error::not_found(format!("group {id}")));
                    }
                }
            }
        }

        state
            .groups
            .get(&gid)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("group {id}")))
    }

    fn update_group(&self, id: u64, options: &UpdateGroupOptions) -> Result<Group> {
        let mut state = self.enter("update_group")?;
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("group {id}")))?;
        apply_settings(group, options);
        let updated = group.clone();

        let full_path = state.full_path_for(updated.parent_id, &updated.path)?;
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("group {id}")))?;
        group.full_path = full_path;
        Ok(group.clone())
    }

    fn delete_group(&self, id: u64) -> Result<()> {
        let mut state = self.enter("delete_group")?;
        if !state.groups.contains_key(&id) {
            return Err(Error::not_found(format!("group {id}")));
        }
        match state.deletion_mode {
            DeletionMode::Immediate => {
                state.groups.remove(&id);
            }
            DeletionMode::LingerThenGone { reads } | DeletionMode::LingerThenMark { reads } => {
                state.pending_deletions.insert(id, reads);
            }
            DeletionMode::Never => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_named(name: &str) -> CreateGroupOptions {
        CreateGroupOptions {
            settings: GroupSettings {
                name: Some(name.to_string()),
                path: Some(name.to_string()),
                ..Default::default()
            },
            parent_id: None,
        }
    }

    #[test]
    fn test_mock_seeded_project() {
        let mock = MockApi::new();
        mock.add_project("42");
        let main = mock.get_branch("42", "main").unwrap();
        assert!(main.default);
        assert!(main.commit.is_some());
        assert!(mock.get_branch("42", "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_mock_create_branch_copies_ref_commit() {
        let mock = MockApi::new();
        mock.add_project("42");
        let options = CreateBranchOptions {
            branch: "feature".to_string(),
            reference: "main".to_string(),
        };
        let branch = mock.create_branch("42", &options).unwrap();
        let main = mock.get_branch("42", "main").unwrap();
        assert_eq!(branch.commit, main.commit);

        let again = mock.create_branch("42", &options).unwrap_err();
        assert_eq!(again.status(), Some(400));
    }

    #[test]
    fn test_mock_create_branch_invalid_ref() {
        let mock = MockApi::new();
        mock.add_project("42");
        let err = mock
            .create_branch(
                "42",
                &CreateBranchOptions {
                    branch: "feature".to_string(),
                    reference: "does-not-exist".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_mock_subgroup_full_path() {
        let mock = MockApi::new();
        let parent = mock.create_group(&group_named("parent")).unwrap();
        let mut child = group_named("child");
        child.parent_id = Some(parent.id);
        let child = mock.create_group(&child).unwrap();
        assert_eq!(child.full_path, "parent/child");
        assert_eq!(mock.get_group("parent/child").unwrap().id, child.id);
    }

    #[test]
    fn test_mock_lingering_deletion_then_gone() {
        let mock = MockApi::new();
        let group = mock.create_group(&group_named("foo")).unwrap();
        mock.set_deletion_mode(DeletionMode::LingerThenGone { reads: 2 });
        mock.delete_group(group.id).unwrap();

        let id = group.id.to_string();
        assert!(mock.get_group(&id).is_ok());
        assert!(mock.get_group(&id).is_ok());
        assert!(mock.get_group(&id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_mock_lingering_deletion_then_marked() {
        let mock = MockApi::new();
        let group = mock.create_group(&group_named("foo")).unwrap();
        mock.set_deletion_mode(DeletionMode::LingerThenMark { reads: 1 });
        mock.delete_group(group.id).unwrap();

        let id = group.id.to_string();
        assert!(!mock.get_group(&id).unwrap().is_marked_for_deletion());
        assert!(mock.get_group(&id).unwrap().is_marked_for_deletion());
    }

    #[test]
    fn test_mock_injected_failure_and_call_log() {
        let mock = MockApi::new();
        mock.fail("get_group", 500);
        let err = mock.get_group("1").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(mock.calls(), vec!["get_group".to_string()]);
        assert_eq!(mock.call_count("get_group"), 1);
    }
}
