//! `glprov apply` - converge GitLab with the config

use anyhow::{Result, bail};
use declarative::{ExecuteOptions, ExecuteSummary};

use super::Workspace;
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Apply");

    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let mut ws = Workspace::open(ctx)?;
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: usize::from(args.jobs.jobs),
        verbose: ctx.verbose > 0,
    };
    let summary = apply(&mut ws, args.target.as_deref(), &opts, args.yes)?;

    if !summary.is_success() {
        bail!("{} resource(s) failed to apply", summary.failed);
    }
    Ok(())
}

/// Refresh, plan and apply, then record the result
///
/// State is saved even when some changes fail so that the ones that
/// succeeded are not lost.
pub fn apply(
    ws: &mut Workspace,
    target: Option<&str>,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteSummary> {
    let report = ws.refresh(opts.jobs)?;
    let plan = ws.plan(&report, target)?;

    let mut tracked = report.tracked;
    let result = engine::execute(&ws.registry, &plan, &mut tracked, opts, yes);

    if !opts.dry_run {
        ws.save(&tracked)?;
    }
    result
}
