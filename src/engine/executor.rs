//! Execution engine - glprov executor with UI integration

use anyhow::Result;
use colored::Colorize;
use declarative::{
    Action, Address, ApplyResult, AutoConfirm, ConfirmCallback, ExecuteOptions, ExecuteSummary,
    ExecutionPlan, ProgressCallback, Registry, Tracked,
};
use indicatif::ProgressBar;

use crate::progress;

use super::differ::display_diff;

/// Progress bar fed by the declarative executor
#[derive(Default)]
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl TerminalProgress {
    pub fn new(verbose: bool) -> Self {
        Self { bar: None, verbose }
    }
}

fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created
        | ApplyResult::Modified
        | ApplyResult::Replaced
        | ApplyResult::Removed => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_batch_start(&mut self, count: usize) {
        self.bar = Some(progress::bar(count as u64, "Applying"));
    }

    fn on_resource_start(&mut self, address: &Address, action: &Action) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("{address} ({action})"));
        }
    }

    fn on_resource_complete(&mut self, address: &Address, result: &ApplyResult) {
        let Some(pb) = &self.bar else {
            return;
        };
        match result {
            ApplyResult::Failed { error } => pb.suspend(|| {
                println!("  {} {} {}", "✗".red(), address, error.dimmed());
            }),
            other if self.verbose => pb.suspend(|| {
                println!("  {} {}", result_symbol(other).green(), address);
            }),
            _ => {}
        }
        pb.set_message(format!("{} {}", result_symbol(result), address));
        pb.inc(1);
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

/// Interactive confirmation
pub struct PromptConfirm {
    pub default: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(self.default)
            .interact()?;

        Ok(confirmed)
    }
}

/// Display the plan, confirm, and apply it
///
/// `tracked` is updated with every change that succeeded.
pub fn execute(
    registry: &Registry,
    plan: &ExecutionPlan,
    tracked: &mut Tracked,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteSummary> {
    let diffs = plan.diffs();
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteSummary {
            no_change: plan.total_resources(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    println!();
    let destructive = plan
        .pending()
        .any(|c| matches!(c.action, Action::Delete | Action::Replace { .. }));
    let mut progress = TerminalProgress::new(opts.verbose);

    let summary = if yes {
        declarative::execute(registry, plan, tracked, opts, &mut progress, &mut AutoConfirm)?
    } else {
        let mut confirm = PromptConfirm {
            default: !destructive,
        };
        declarative::execute(registry, plan, tracked, opts, &mut progress, &mut confirm)?
    };

    if summary.skipped == diffs.len() && summary.total_changes() == 0 && summary.failed == 0 {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(summary);
    }

    print_summary(&summary);
    Ok(summary)
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources updated", summary.modified);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.removed > 0 {
        println!("    • {} resources destroyed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
