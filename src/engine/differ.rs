//! Plan display

use crate::ui;
use colored::{ColoredString, Colorize};
use declarative::{Action, AttributeChange, DiffSummary, ResourceDiff, group_by_type};
use serde_json::Value;

const VALUE_WIDTH: usize = 40;

fn action_symbol(action: &Action) -> ColoredString {
    match action {
        Action::Create | Action::Recreate => action.symbol().green(),
        Action::Update { .. } => action.symbol().yellow(),
        Action::Replace { .. } => action.symbol().magenta(),
        Action::Delete => action.symbol().red(),
        Action::NoChange => action.symbol().dimmed(),
    }
}

/// Render an attribute value on one line
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "(unset)".to_string(),
        Value::String(s) => format!("\"{}\"", ui::truncate(s, VALUE_WIDTH)),
        other => ui::truncate(&other.to_string(), VALUE_WIDTH),
    }
}

fn format_change(change: &AttributeChange, action: &Action) -> String {
    let note = if change.force_new && matches!(action, Action::Replace { .. }) {
        " # forces replacement".red().to_string()
    } else {
        String::new()
    };

    if change.before.is_null() {
        format!("{} = {}", change.name, format_value(&change.after))
    } else {
        format!(
            "{} = {} → {}{}",
            change.name,
            format_value(&change.before),
            format_value(&change.after),
            note
        )
    }
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in &group_by_type(diffs) {
        println!("│ {}", resource_type.bold());

        for diff in type_diffs {
            println!(
                "│   {} {:<30} {}",
                action_symbol(&diff.action),
                diff.address.name,
                diff.action.to_string().dimmed()
            );
            for change in &diff.changes {
                println!("│       {}", format_change(change, &diff.action));
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to add, {} to change, {} to replace, {} to destroy",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.replacements.to_string().magenta(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Null), "(unset)");
        assert_eq!(format_value(&json!("main")), "\"main\"");
        assert_eq!(format_value(&json!(48)), "48");
        assert_eq!(format_value(&json!(true)), "true");
    }

    #[test]
    fn test_format_change_for_new_attribute() {
        colored::control::set_override(false);
        let change = AttributeChange {
            name: "ref".to_string(),
            before: Value::Null,
            after: json!("main"),
            force_new: true,
        };
        assert_eq!(format_change(&change, &Action::Create), "ref = \"main\"");
    }

    #[test]
    fn test_format_change_marks_replacement() {
        colored::control::set_override(false);
        let change = AttributeChange {
            name: "ref".to_string(),
            before: json!("main"),
            after: json!("master"),
            force_new: true,
        };
        let action = Action::Replace {
            fields: vec!["ref".to_string()],
        };
        assert_eq!(
            format_change(&change, &action),
            "ref = \"main\" → \"master\" # forces replacement"
        );
    }
}
