//! `glprov refresh` - record what GitLab currently reports

use anyhow::{Result, bail};
use declarative::RefreshReport;

use super::Workspace;
use crate::Context;
use crate::cli::JobsArgs;
use crate::ui;

pub fn run(ctx: &Context, args: &JobsArgs) -> Result<()> {
    ui::header("Refresh");

    let mut ws = Workspace::open(ctx)?;
    let report = refresh(&mut ws, usize::from(args.jobs))?;

    ui::success(&format!(
        "Refreshed {} resource(s), {} gone",
        report.tracked.len(),
        report.missing.len()
    ));
    if !report.is_success() {
        bail!("{} resource(s) could not be refreshed", report.errors.len());
    }
    Ok(())
}

/// Refresh and save; instances that could not be read keep their prior state
pub fn refresh(ws: &mut Workspace, jobs: usize) -> Result<RefreshReport> {
    let report = ws.refresh(jobs)?;
    ws.save(&report.tracked)?;
    Ok(report)
}
