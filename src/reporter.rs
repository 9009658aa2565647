//! Host reporting: where log lines, groups, outputs and the final verdict go.
//!
//! A pipeline run talks to exactly one [`Reporter`]. On a GitHub Actions runner
//! that is [`ActionsReporter`], which speaks workflow commands; everywhere else
//! it is [`TerminalReporter`]. [`MemoryReporter`] records events for embedding
//! and tests.

use crate::error::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sink for pipeline progress and results.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);

    fn start_group(&self, name: &str);

    fn end_group(&self);

    /// Publish a named output value for the orchestrating caller.
    fn set_output(&self, name: &str, value: &str) -> Result<()>;

    /// Report the single failure verdict of the run.
    fn set_failed(&self, message: &str);
}

// ============================================================================
// GITHUB ACTIONS
// ============================================================================

/// Reporter that emits GitHub Actions workflow commands on stdout.
pub struct ActionsReporter {
    output_file: Option<PathBuf>,
    group_open: AtomicBool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ActionsReporter {
    #[must_use]
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self::with_writer(output_file, Box::new(std::io::stdout()))
    }

    /// Send workflow commands to `out` instead of stdout.
    #[must_use]
    pub fn with_writer(output_file: Option<PathBuf>, out: Box<dyn Write + Send>) -> Self {
        Self {
            output_file,
            group_open: AtomicBool::new(false),
            out: Mutex::new(out),
        }
    }

    /// Use `$GITHUB_OUTPUT` when the runner provides it.
    #[must_use]
    pub fn from_env() -> Self {
        let output_file = std::env::var_os("GITHUB_OUTPUT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(output_file)
    }

    fn emit(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }
}

impl Reporter for ActionsReporter {
    fn info(&self, message: &str) {
        self.emit(message);
    }

    fn warning(&self, message: &str) {
        self.emit(&workflow_command("warning", message));
    }

    fn error(&self, message: &str) {
        self.emit(&workflow_command("error", message));
    }

    fn start_group(&self, name: &str) {
        self.group_open.store(true, Ordering::SeqCst);
        self.emit(&workflow_command("group", name));
    }

    /// No-op unless a group is open.
    fn end_group(&self) {
        if self.group_open.swap(false, Ordering::SeqCst) {
            self.emit("::endgroup::");
        }
    }

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        let Some(path) = &self.output_file else {
            // Runners without GITHUB_OUTPUT still accept the legacy command
            self.emit(&format!(
                "::set-output name={}::{}",
                escape_property(name),
                escape_data(value)
            ));
            return Ok(());
        };

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(output_file_entry(name, value).as_bytes())?;
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        self.error(message);
    }
}

/// Format `::command::message` with the message escaped.
#[must_use]
pub fn workflow_command(command: &str, message: &str) -> String {
    format!("::{command}::{}", escape_data(message))
}

/// Escape a workflow command message (`%`, CR and LF).
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Heredoc-style entry for `$GITHUB_OUTPUT`, safe for multi-line values.
#[must_use]
pub fn output_file_entry(name: &str, value: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut delimiter = format!("ghadelimiter_{}_{nanos}", std::process::id());
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

// ============================================================================
// TERMINAL
// ============================================================================

/// Write one line to stdout. A closed pipe is not worth a panic.
fn print_line(line: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
}

/// Reporter for interactive use: colored status lines on the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn info(&self, message: &str) {
        if !message.is_empty() {
            print_line(message);
        }
    }

    fn warning(&self, message: &str) {
        crate::warn!("{message}");
    }

    fn error(&self, message: &str) {
        crate::error!("{message}");
    }

    fn start_group(&self, name: &str) {
        crate::heading!("{name}");
    }

    fn end_group(&self) {
        print_line("");
    }

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        crate::success!("{name}: {value}");
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        crate::error!("{message}");
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Info(String),
    Warning(String),
    Error(String),
    GroupStart(String),
    GroupEnd,
    Output { name: String, value: String },
    Failed(String),
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.filter(|e| match e {
            ReportEvent::Error(m) => Some(m.clone()),
            _ => None,
        })
    }

    #[must_use]
    pub fn infos(&self) -> Vec<String> {
        self.filter(|e| match e {
            ReportEvent::Info(m) => Some(m.clone()),
            _ => None,
        })
    }

    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.filter(|e| match e {
            ReportEvent::Failed(m) => Some(m.clone()),
            _ => None,
        })
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<String> {
        self.events().into_iter().find_map(|e| match e {
            ReportEvent::Output { name: n, value } if n == name => Some(value),
            _ => None,
        })
    }

    fn filter(&self, f: impl Fn(&ReportEvent) -> Option<String>) -> Vec<String> {
        self.events().iter().filter_map(f).collect()
    }

    fn push(&self, event: ReportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.push(ReportEvent::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(ReportEvent::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(ReportEvent::Error(message.to_string()));
    }

    fn start_group(&self, name: &str) {
        self.push(ReportEvent::GroupStart(name.to_string()));
    }

    fn end_group(&self) {
        self.push(ReportEvent::GroupEnd);
    }

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        self.push(ReportEvent::Output {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn set_failed(&self, message: &str) {
        self.push(ReportEvent::Failed(message.to_string()));
    }
}
