//! `TerminalReporter`: the `ProgressReporter` port drawn on the terminal.
//!
//! Stages are numbered in the order the build starts them. Each completion
//! line carries the time since its stage began.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::application::ports::ProgressReporter;
use crate::output::{Mark, OutputContext};

pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    stages: Cell<u32>,
    stage_started: Cell<Option<Instant>>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            stages: Cell::new(0),
            stage_started: Cell::new(None),
        }
    }

    /// Number the next stage and start its clock.
    fn begin_stage(&self) -> u32 {
        let n = self.stages.get() + 1;
        self.stages.set(n);
        self.stage_started.set(Some(Instant::now()));
        n
    }

    /// Time since the current stage began, if any stage is running.
    fn end_stage(&self) -> Option<Duration> {
        self.stage_started.take().map(|t| t.elapsed())
    }
}

/// `[n] message` for stage lines.
#[must_use]
pub fn stage_message(n: u32, message: &str) -> String {
    format!("[{n}] {message}")
}

/// Append elapsed time to a completion message once it reaches one second.
#[must_use]
pub fn done_message(message: &str, elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(d) if d.as_secs() >= 60 => {
            format!("{message} ({}m {:02}s)", d.as_secs() / 60, d.as_secs() % 60)
        }
        Some(d) if d.as_secs() >= 1 => format!("{message} ({}s)", d.as_secs()),
        _ => message.to_owned(),
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        let n = self.begin_stage();
        self.ctx.emit(Mark::Stage, &stage_message(n, message));
    }

    fn success(&self, message: &str) {
        let elapsed = self.end_stage();
        self.ctx.emit(Mark::Done, &done_message(message, elapsed));
    }

    fn warn(&self, message: &str) {
        self.ctx.emit(Mark::Warn, message);
    }
}
