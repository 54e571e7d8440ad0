//! `glprov destroy` - delete tracked resources

use anyhow::{Result, bail};
use declarative::{ExecuteOptions, ExecuteSummary, ExecutionPlan};

use super::Workspace;
use crate::Context;
use crate::cli::DestroyArgs;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    ui::header("Destroy");

    let mut ws = Workspace::open(ctx)?;
    let opts = ExecuteOptions {
        dry_run: false,
        jobs: usize::from(args.jobs.jobs),
        verbose: ctx.verbose > 0,
    };
    let summary = destroy(&mut ws, args.target.as_deref(), &opts, args.yes)?;

    if !summary.is_success() {
        bail!("{} resource(s) could not be destroyed", summary.failed);
    }
    Ok(())
}

/// Delete every tracked instance matching `target`
pub fn destroy(
    ws: &mut Workspace,
    target: Option<&str>,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteSummary> {
    let report = ws.refresh(opts.jobs)?;
    let plan = ExecutionPlan::destroy(&report.tracked).filter_by_target(target);

    let mut tracked = report.tracked;
    let result = engine::execute(&ws.registry, &plan, &mut tracked, opts, yes);
    ws.save(&tracked)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::apply::apply;
    use crate::commands::testing::{CONFIG, workspace};
    use gitlab_client::{Api, DeletionMode, MockApi};

    #[test]
    fn test_destroy_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockApi::new();
        mock.add_project("42");
        let mut ws = workspace(&mock, dir.path(), CONFIG);
        apply(&mut ws, None, &ExecuteOptions::default(), true).unwrap();

        mock.set_deletion_mode(DeletionMode::LingerThenMark { reads: 2 });
        let summary = destroy(&mut ws, None, &ExecuteOptions::default(), true).unwrap();
        assert_eq!(summary.removed, 2);
        assert!(ws.tracked().is_empty());
        assert!(mock.get_group("foo-path").unwrap().is_marked_for_deletion());
    }

    #[test]
    fn test_destroy_target() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockApi::new();
        mock.add_project("42");
        let mut ws = workspace(&mock, dir.path(), CONFIG);
        apply(&mut ws, None, &ExecuteOptions::default(), true).unwrap();

        let summary =
            destroy(&mut ws, Some("gitlab_branch.feature"), &ExecuteOptions::default(), true)
                .unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(ws.tracked().len(), 1);
        assert_eq!(mock.call_count("delete_group"), 0);
    }
}
