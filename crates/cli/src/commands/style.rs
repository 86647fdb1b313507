//! Shared styling utilities for the CLI.

use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Colored label for a history action.
pub fn action_label(action: &str) -> String {
    let style = match action {
        "pull" => Style::new().blue().bold(),
        "push" => Style::new().magenta().bold(),
        _ => Style::new().green().bold(),
    };
    style.apply_to(action).to_string()
}

/// Status marker: success (green) or failure (red).
pub fn outcome_marker(success: bool) -> String {
    if success {
        Style::new().green().apply_to("ok").to_string()
    } else {
        Style::new().red().apply_to("failed").to_string()
    }
}
