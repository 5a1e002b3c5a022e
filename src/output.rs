// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::pipeline::{PipelineState, StatusReport};
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages and build output
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// One line of build tool output, indented under the progress messages.
    pub fn build_line(&self, line: &str) {
        if self.mode == OutputMode::Normal {
            println!("    {line}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print why an input was turned away without anything failing.
    pub fn rejected(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "rejected",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a status report.
    pub fn status(&self, report: &StatusReport) {
        match self.mode {
            OutputMode::Json => print_json(report),
            OutputMode::Quiet => println!("{}", report.state),
            OutputMode::Normal => print!("{}", render_status(report)),
        }
    }

    /// Print `value` as JSON in JSON mode; `summary` otherwise.
    pub fn result<T: Serialize>(&self, summary: &str, value: &T) {
        match self.mode {
            OutputMode::Json => print_json(value),
            _ => self.success(summary),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

/// Human-readable rendering of a status report.
pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Project:    {} ({}, tracking {})\n",
        report.project, report.build_type, report.branch
    ));
    let record = &report.record;
    if record.trigger.is_none() && report.state == PipelineState::Idle {
        out.push_str("State:      idle (no deployment since start)\n");
    } else {
        out.push_str(&format!("State:      {}\n", report.state));
    }

    if let Some(trigger) = &record.trigger {
        out.push_str(&format!("Trigger:    {}\n", trigger));
    }
    if let Some(started) = record.started_at {
        out.push_str(&format!("Started:    {}\n", started.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(up) = record.last_up {
        out.push_str(&format!("Last up:    {}\n", up.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(error) = &record.error {
        out.push_str(&format!("Error:      {}\n", error.message));
    }

    if let Some(error) = &report.containers_error {
        out.push_str(&format!("Containers: unavailable ({})\n", error));
    } else if report.containers.is_empty() {
        out.push_str("Containers: none running\n");
    } else {
        out.push_str("Containers:\n");
        for c in &report.containers {
            out.push_str(&format!("  {}  {}  {}\n", c.id, c.name, c.image));
        }
    }

    if !report.log_tail.is_empty() {
        out.push_str("Recent output:\n");
        for line in &report.log_tail {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
