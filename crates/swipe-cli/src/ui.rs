//! Terminal output for the swipe CLI.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

pub mod colors {
    use console::Color;

    pub const CYAN: Color = Color::Color256(51);
    pub const MAGENTA: Color = Color::Color256(201);
    pub const NEON_GREEN: Color = Color::Color256(82);
    pub const DIM: Color = Color::Color256(240);
}

pub mod symbols {
    pub const DIAMOND: &str = "\u{25C6}"; // ◆
    pub const DIAMOND_OUTLINE: &str = "\u{25C7}"; // ◇
    pub const TARGET_FILLED: &str = "\u{25C9}"; // ◉
    pub const DOT: &str = "\u{00B7}"; // ·
}

pub fn print_compact_header(version: &str) {
    println!(
        "  {} {} {}",
        style(symbols::DIAMOND).fg(colors::CYAN),
        style("swipe").fg(colors::CYAN).bold(),
        style(version).dim()
    );
}

pub fn success(msg: &str) {
    println!(
        "  {} {}",
        style(symbols::TARGET_FILLED).fg(colors::NEON_GREEN),
        msg
    );
}

pub fn error(msg: &str) {
    println!(
        "  {} {}",
        style(symbols::DIAMOND).fg(colors::MAGENTA),
        style(msg).fg(colors::MAGENTA)
    );
}

pub fn info(msg: &str) {
    println!(
        "  {} {}",
        style(symbols::DIAMOND_OUTLINE).fg(colors::CYAN),
        msg
    );
}

pub fn dim(msg: &str) {
    println!("  {}", style(msg).fg(colors::DIM));
}

/// A spinner on an interactive terminal, a hidden bar otherwise.
pub fn spinner(msg: &str) -> ProgressBar {
    if !console::Term::stdout().is_term() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("\u{25CE}\u{25C9}\u{25CE}\u{25C9}") // ◎◉◎◉
        .template("  {spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(150));
    pb
}

/// One generated file, relative to the module root when possible.
pub fn file_line(root: &Path, path: &Path, errors: usize) {
    let shown = path.strip_prefix(root).unwrap_or(path);
    if errors == 0 {
        println!(
            "    {} {}",
            style(symbols::DOT).fg(colors::DIM),
            shown.display()
        );
    } else {
        println!(
            "    {} {} {}",
            style(symbols::DIAMOND).fg(colors::MAGENTA),
            shown.display(),
            style(format!("({errors} error(s))")).fg(colors::MAGENTA)
        );
    }
}

pub fn timing(label: &str, duration_ms: u128) {
    println!(
        "  {} {} in {}ms",
        style(symbols::DIAMOND_OUTLINE).fg(colors::CYAN),
        label,
        duration_ms
    );
}

pub fn error_header() {
    println!();
    println!(
        "  {} {}",
        style(symbols::DIAMOND).fg(colors::MAGENTA).bold(),
        style("Generation failed.").fg(colors::MAGENTA).bold()
    );
    println!();
}
