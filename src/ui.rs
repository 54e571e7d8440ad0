use colored::Colorize;

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

/// Shorten a value for single-line display
pub fn truncate(value: &str, max_len: usize) -> String {
    let first_line = value.lines().next().unwrap_or_default();
    let count = first_line.chars().count();
    if count <= max_len && first_line.len() == value.len() {
        value.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = first_line.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Advice for the first GitLab error in `err`'s chain
pub fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<gitlab_client::Error>())
        .map(|e| e.category().advice())
}
