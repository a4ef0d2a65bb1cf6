use colored::{ColoredString, Colorize};
use reconcile::{ApplyResult, BarrierStatus, PlannedAction};

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

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
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

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Coloured marker for a planned change: `+`, `~` or `-`
pub fn plan_symbol(action: &PlannedAction) -> ColoredString {
    match action {
        PlannedAction::Create => "+".green(),
        PlannedAction::Update(_) => "~".yellow(),
        PlannedAction::Delete => "-".red(),
    }
}

/// Coloured marker for a resource result
pub fn result_symbol(result: &ApplyResult) -> ColoredString {
    match result {
        ApplyResult::NoChange => result.symbol().dimmed(),
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => {
            result.symbol().green()
        }
        ApplyResult::Planned(action) => plan_symbol(action),
        ApplyResult::Failed { .. } => result.symbol().red(),
    }
}

/// Coloured marker for a deferred action outcome
pub fn barrier_symbol(status: &BarrierStatus) -> ColoredString {
    match status {
        BarrierStatus::Applied => "✓".green(),
        BarrierStatus::AppliedWithWarnings => "⚠".yellow(),
        BarrierStatus::SkippedAlert | BarrierStatus::SkippedErrored => "⊘".yellow(),
        _ => "✗".red(),
    }
}

/// First non-empty line of `text`, cut to at most `max_len` characters
///
/// `...` marks that something was left out, either the rest of the line or
/// further lines.
pub fn truncate(text: &str, max_len: usize) -> String {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let line = lines.next().unwrap_or("");
    let more_lines = lines.next().is_some();

    if line.chars().count() <= max_len && !more_lines {
        return line.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = line.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// `1 resource`, `3 resources`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

// ============================================================================
// Tests
// ============================================================================
