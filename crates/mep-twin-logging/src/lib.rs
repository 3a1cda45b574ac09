//! ---
//! twin_section: "03-persistence-logging"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Structured logging context and convenience macros."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Every engine event carries the same four fields (`run`, `month`, `equipment`, `task`)
//! so log lines from parallel runs can be told apart and filtered per node.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and quick experiments.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Label of the simulation run.
    pub run: Option<&'a str>,
    /// Simulated month key (`YYYY-MM`).
    pub month: Option<&'a str>,
    /// Equipment node identifier.
    pub equipment: Option<&'a str>,
    /// Task instance identifier.
    pub task: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a run label.
    pub fn with_run(mut self, run: &'a str) -> Self {
        self.run = Some(run);
        self
    }

    /// Attach a month key.
    pub fn with_month(mut self, month: &'a str) -> Self {
        self.month = Some(month);
        self
    }

    /// Attach an equipment identifier.
    pub fn with_equipment(mut self, equipment: &'a str) -> Self {
        self.equipment = Some(equipment);
        self
    }

    /// Attach a task instance identifier.
    pub fn with_task(mut self, task: &'a str) -> Self {
        self.task = Some(task);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (run started, run finished, export written).
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            run = ctx.run.unwrap_or(""),
            month = ctx.month.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            run = ctx.run.unwrap_or(""),
            month = ctx.month.unwrap_or(""),
            message = %message
        ),
    }
}
