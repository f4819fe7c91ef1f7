use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, Outcome};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Symbol for the outcome of one operation
pub fn symbol(outcome: Outcome) -> ColoredString {
    match outcome {
        Outcome::Applied => "✓".green(),
        Outcome::Unchanged => "○".dimmed(),
        Outcome::Skipped => "⊘".yellow(),
        Outcome::Failed => "✗".red(),
    }
}

/// Short text for what happened to one operation
pub fn describe(result: &ApplyResult) -> String {
    match result {
        ApplyResult::Unchanged => "unchanged".to_string(),
        ApplyResult::Created => "created".to_string(),
        ApplyResult::Modified => "modified".to_string(),
        ApplyResult::Removed => "removed".to_string(),
        ApplyResult::Executed { command } => format!("ran `{command}`"),
        ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
        ApplyResult::Failed { error } => format!("failed: {error}"),
    }
}
