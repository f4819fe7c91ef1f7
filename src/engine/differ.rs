//! Diff display - pending changes and file content diffs

use colored::Colorize;
use declarative::{DiffSummary, ResourceDiff, ResourceState, group_by_type};
use similar::{ChangeTag, TextDiff};

/// Heading for a resource type
fn type_name(resource_type: &str) -> &str {
    match resource_type {
        "kmod_load" => "Loaded modules",
        "modules_load_file" => "Module lists (/etc/modules-load.d)",
        "sysconfig_script" => "Boot scripts (/etc/sysconfig/modules)",
        "augeas" => "Config entries",
        "file_attributes" => "File ownership",
        other => other,
    }
}

/// Marker for the kind of change
pub fn change_symbol(diff: &ResourceDiff) -> &'static str {
    if diff.is_unknown() {
        "?"
    } else if diff.is_addition() {
        "+"
    } else if diff.is_removal() {
        "-"
    } else {
        "~"
    }
}

/// One-line description of current → desired
pub fn state_change(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Unknown, _) => "(current state unknown)".to_string(),
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "(missing){}",
            details
                .as_ref()
                .map(|d| format!(" → {d}"))
                .unwrap_or_default()
        ),
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (ResourceState::Present { details: from }, ResourceState::Present { details: to }) => {
            format!(
                "{} → {}",
                from.as_deref().unwrap_or("current"),
                to.as_deref().unwrap_or("desired")
            )
        }
        (_, ResourceState::Absent) => "(will remove)".to_string(),
        _ => String::new(),
    }
}

/// Display a list of diffs grouped by resource type
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let mut by_type: Vec<_> = group_by_type(diffs).into_iter().collect();
    by_type.sort_by(|a, b| a.0.cmp(&b.0));

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Pending Changes".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in &by_type {
        println!("│ {}", type_name(resource_type).bold());

        for diff in type_diffs {
            let symbol = match change_symbol(diff) {
                "+" => "+".green(),
                "-" => "-".red(),
                "~" => "~".yellow(),
                other => other.dimmed(),
            };
            println!(
                "│   {} {:<40} {}",
                symbol,
                diff.resource_id,
                state_change(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to add, {} to remove, {} to modify)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.removals.to_string().red(),
        summary.modifications.to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Changed lines between two versions of a file, `-`/`+` prefixed
pub fn content_diff(current: &str, desired: &str) -> Vec<String> {
    TextDiff::from_lines(current, desired)
        .iter_all_changes()
        .filter_map(|change| {
            let line = change.to_string_lossy();
            let line = line.trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => Some(format!("- {line}")),
                ChangeTag::Insert => Some(format!("+ {line}")),
                ChangeTag::Equal => None,
            }
        })
        .collect()
}

/// Print a content diff under a resource line
pub fn show_content_diff(current: &str, desired: &str) {
    let lines = content_diff(current, desired);
    if lines.is_empty() {
        println!("    {}", "(content is identical)".dimmed());
        return;
    }
    for line in lines {
        if line.starts_with('-') {
            println!("    {}", line.red());
        } else {
            println!("    {}", line.green());
        }
    }
}
