//! Provider wiring: one GitLab client shared by every resource kind

use crate::config::ProviderSettings;
use crate::resource::{BranchKind, GroupKind};
use declarative::Registry;
use gitlab_client::Client;

/// Build the client described by `settings`
pub fn client(settings: &ProviderSettings) -> Client {
    if settings.token.is_none() {
        log::warn!("No GitLab token configured; requests are unauthenticated");
    }
    log::debug!("Using GitLab API at {}", settings.base_url);
    Client::new(&settings.client_config())
}

/// Register every resource kind against `client`
pub fn registry(client: &Client, default_ref: &str) -> Registry {
    let mut registry = Registry::new();
    registry
        .register(BranchKind::new(client.clone(), default_ref))
        .register(GroupKind::new(client.clone()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{branch, group};
    use declarative::{
        Action, Address, AutoConfirm, Declaration, ExecuteOptions, ExecutionPlan, NoProgress,
        Tracked, execute, refresh,
    };
    use gitlab_client::MockApi;
    use serde_json::json;
    use std::sync::Arc;

    fn address(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn mock_registry(mock: &MockApi) -> Registry {
        registry(&Client::with_backend(Arc::new(mock.clone())), "master")
    }

    fn declarations() -> Vec<Declaration> {
        vec![
            Declaration::new(
                address("gitlab_branch.feature"),
                json!({"name": "testbranch-1", "project": "42", "ref": "main"}),
            ),
            Declaration::new(
                address("gitlab_group.foo"),
                json!({"name": "foo-name", "path": "foo-path", "visibility_level": "public"}),
            ),
        ]
    }

    fn apply(registry: &Registry, decls: &[Declaration], tracked: &mut Tracked) -> ExecutionPlan {
        let report = refresh(registry, tracked, 2).unwrap();
        let plan =
            ExecutionPlan::build(registry, decls, &report.tracked, &report.missing).unwrap();
        *tracked = report.tracked;
        let summary = execute(
            registry,
            &plan,
            tracked,
            &ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert!(summary.is_success(), "{summary:?}");
        plan
    }

    #[test]
    fn test_registry_has_both_kinds() {
        let registry = mock_registry(&MockApi::new());
        let names: Vec<_> = registry.type_names().collect();
        assert_eq!(names, vec![branch::TYPE_NAME, group::TYPE_NAME]);
    }

    #[test]
    fn test_converges_and_stays_converged() {
        let mock = MockApi::new();
        mock.add_project("42");
        let registry = mock_registry(&mock);
        let mut tracked = Tracked::new();

        apply(&registry, &declarations(), &mut tracked);
        assert_eq!(tracked.len(), 2);
        let branch = &tracked[&address("gitlab_branch.feature")];
        assert_eq!(branch.id, "42-testbranch-1");
        assert!(!branch.attributes["commit"][0]["id"].as_str().unwrap().is_empty());

        let second = apply(&registry, &declarations(), &mut tracked);
        assert!(!second.has_changes(), "{:?}", second.diffs());
    }

    #[test]
    fn test_ref_change_replaces_branch() {
        let mock = MockApi::new();
        mock.add_project("42");
        let registry = mock_registry(&mock);
        let mut tracked = Tracked::new();
        apply(&registry, &declarations(), &mut tracked);

        let mut decls = declarations();
        decls[0].config = json!({"name": "testbranch-1", "project": "42", "ref": "master"});
        let plan = apply(&registry, &decls, &mut tracked);
        let change = plan
            .changes
            .iter()
            .find(|c| c.address.kind == branch::TYPE_NAME)
            .unwrap();
        assert_eq!(
            change.action,
            Action::Replace {
                fields: vec!["ref".to_string()]
            }
        );
        assert_eq!(mock.call_count("delete_branch"), 1);
        assert_eq!(mock.call_count("update_group"), 0);
    }

    #[test]
    fn test_out_of_band_removal_is_recreated() {
        let mock = MockApi::new();
        mock.add_project("42");
        let registry = mock_registry(&mock);
        let mut tracked = Tracked::new();
        apply(&registry, &declarations(), &mut tracked);

        mock.remove_branch("42", "testbranch-1");
        let report = refresh(&registry, &tracked, 2).unwrap();
        assert!(report.missing.contains(&address("gitlab_branch.feature")));

        let plan = ExecutionPlan::build(
            &registry,
            &declarations(),
            &report.tracked,
            &report.missing,
        )
        .unwrap();
        let pending: Vec<_> = plan.pending().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].address, address("gitlab_branch.feature"));
        assert_eq!(pending[0].action, Action::Recreate);
    }

    #[test]
    fn test_group_removed_out_of_band_is_recreated() {
        let mock = MockApi::new();
        mock.add_project("42");
        let registry = mock_registry(&mock);
        let mut tracked = Tracked::new();
        apply(&registry, &declarations(), &mut tracked);

        let group = address("gitlab_group.foo");
        let id: u64 = tracked[&group].id.parse().unwrap();
        mock.remove_group(id);

        let report = refresh(&registry, &tracked, 2).unwrap();
        assert!(report.missing.contains(&group));
        assert!(!report.tracked.contains_key(&group));

        let plan = ExecutionPlan::build(
            &registry,
            &declarations(),
            &report.tracked,
            &report.missing,
        )
        .unwrap();
        let pending: Vec<_> = plan.pending().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].address, group);
        assert_eq!(pending[0].action, Action::Recreate);
    }

    #[test]
    fn test_undeclared_group_is_deleted() {
        let mock = MockApi::new();
        mock.add_project("42");
        let registry = mock_registry(&mock);
        let mut tracked = Tracked::new();
        apply(&registry, &declarations(), &mut tracked);

        let decls = declarations().into_iter().take(1).collect::<Vec<_>>();
        apply(&registry, &decls, &mut tracked);
        assert_eq!(tracked.len(), 1);
        assert_eq!(mock.call_count("delete_group"), 1);
    }
}
