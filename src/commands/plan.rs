//! `glprov plan` - show what apply would change

use anyhow::Result;

use super::Workspace;
use crate::Context;
use crate::cli::PlanArgs;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    ui::header("Plan");

    let ws = Workspace::open(ctx)?;
    let report = ws.refresh(usize::from(args.jobs.jobs))?;
    let plan = ws.plan(&report, args.target.as_deref())?;

    engine::display_diff(&plan.diffs());
    if plan.has_changes() && !ctx.quiet {
        println!();
        ui::dim("Run `glprov apply` to make these changes");
    }
    Ok(())
}
