//! CLI output formatting.
//!
//! Human-readable output goes to stdout with colored symbols. In `--json`
//! mode every line is a `{"type": ..., "payload": ...}` object instead, and
//! `-q` suppresses everything but warnings, errors and the final report.

use std::fmt::Display;
use std::sync::{OnceLock, RwLock};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

use crate::domain::{ClusterHealth, NodeStatus};

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    match config_cell().read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Apply output settings from the global CLI flags.
pub fn configure(config: OutputConfig) {
    match config_cell().write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

fn suppressed(config: OutputConfig) -> bool {
    !config.json && config.quiet
}

/// Emit a typed JSON line on stdout.
pub fn emit(kind: &str, payload: impl Serialize) {
    println!("{}", json!({ "type": kind, "payload": payload }));
}

pub fn header(command: &str) {
    let config = read_config();
    if config.json || suppressed(config) {
        return;
    }
    println!(
        "{} {} {}",
        "fleetform".bold(),
        env!("CARGO_PKG_VERSION").dimmed(),
        command.cyan()
    );
    println!();
}

pub fn field(label: &str, value: impl Display) {
    let config = read_config();
    if config.json {
        emit("field", json!({ "label": label, "value": value.to_string() }));
        return;
    }
    if suppressed(config) {
        return;
    }
    println!("  {:<12} {}", label.dimmed(), value);
}

pub fn success(message: &str) {
    let config = read_config();
    if config.json {
        emit("success", json!({ "message": message }));
        return;
    }
    if suppressed(config) {
        return;
    }
    println!("  {} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    if is_json() {
        emit("warning", json!({ "message": message }));
        return;
    }
    println!("  {} {}", "⚠".yellow(), message);
}

/// Errors go to stderr in both modes.
pub fn error(message: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
        return;
    }
    eprintln!("  {} {}", "×".red(), message);
}

pub fn section(title: &str) {
    let config = read_config();
    if config.json || suppressed(config) {
        return;
    }
    println!();
    println!("{}", title.bold());
}

pub fn note(message: &str) {
    let config = read_config();
    if config.json {
        emit("note", json!({ "message": message }));
        return;
    }
    if suppressed(config) {
        return;
    }
    println!("  {}", message.dimmed());
}

pub fn hint(message: &str) {
    let config = read_config();
    if config.json || suppressed(config) {
        return;
    }
    println!("  {}: {}", "hint".cyan().dimmed(), message.dimmed());
}

/// Print pre-rendered content such as a table, indented.
///
/// Tables are part of the report, so `-q` does not hide them.
pub fn lines(content: &str) {
    if is_json() {
        return;
    }
    for line in content.lines() {
        println!("  {line}");
    }
}

pub fn highlight(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.cyan())
}

pub fn muted(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.dimmed())
}

/// Node status colored by severity.
pub fn status(value: NodeStatus) -> String {
    let label = value.to_string();
    if is_json() {
        return label;
    }
    match value {
        NodeStatus::Healthy | NodeStatus::Running => format!("{}", label.green()),
        NodeStatus::Degraded | NodeStatus::Provisioning | NodeStatus::Stopped => {
            format!("{}", label.yellow())
        }
        NodeStatus::Unreachable | NodeStatus::Failed => format!("{}", label.red()),
    }
}

/// Cluster health colored by severity.
pub fn health(value: ClusterHealth) -> String {
    let label = value.to_string();
    if is_json() {
        return label;
    }
    match value {
        ClusterHealth::Healthy => format!("{}", label.green().bold()),
        ClusterHealth::Degraded => format!("{}", label.yellow().bold()),
        ClusterHealth::Unhealthy => format!("{}", label.red().bold()),
    }
}

const BRAILLE_SPINNER: &[&str] = &[
    "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
];

/// Percentage bar for one phase. Hidden in JSON or quiet mode.
pub fn progress_bar() -> ProgressBar {
    let config = read_config();
    if config.json || config.quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} {msg:<10} [{bar:30.cyan/blue}] {pos:>3}%",
    )
    .map(|style| style.tick_strings(BRAILLE_SPINNER).progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

/// Spinner for a single open-ended wait. Hidden in JSON or quiet mode.
pub fn spinner(message: &str) -> ProgressBar {
    let config = read_config();
    if config.json || config.quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("  {spinner:.cyan} {msg}")
        .map(|style| style.tick_strings(BRAILLE_SPINNER))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
