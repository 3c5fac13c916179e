//! Terminal output for the image build.
//!
//! Status lines are `  <glyph> <message>`; the plan and the summary are
//! titled tables with aligned keys.

pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use reporter::TerminalReporter;
pub use styles::{Mark, Styles};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress everything but warnings and errors.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are used only on a TTY and when `no_color` is unset. The CLI
    /// folds `NO_COLOR` into `no_color`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let mut styles = Styles::default();
        if !no_color && is_tty {
            styles.colorize();
        }
        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Download bars are drawn only on an interactive, non-quiet terminal.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Format one status line without printing it.
    #[must_use]
    pub fn status_line(&self, mark: Mark, msg: &str) -> String {
        format!("  {} {msg}", mark.glyph().style(self.styles.for_mark(mark)))
    }

    /// Print a status line. Diagnostics go to stderr and ignore `quiet`.
    pub fn emit(&self, mark: Mark, msg: &str) {
        if mark.is_diagnostic() {
            eprintln!("{}", self.status_line(mark, msg));
        } else if !self.quiet {
            println!("{}", self.status_line(mark, msg));
        }
    }

    /// Format a titled table, padding keys to the widest one.
    #[must_use]
    pub fn table_lines(&self, title: &str, rows: &[(&str, String)]) -> Vec<String> {
        let width = rows.iter().map(|(key, _)| key.chars().count()).max().unwrap_or(0);
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(format!("  {}", title.style(self.styles.title)));
        for (key, value) in rows {
            let padded = format!("{key:<width$}");
            lines.push(format!("    {}  {value}", padded.style(self.styles.key)));
        }
        lines
    }

    /// Print a titled table. Suppressed when `quiet`.
    pub fn table(&self, title: &str, rows: &[(&str, String)]) {
        if self.quiet {
            return;
        }
        for line in self.table_lines(title, rows) {
            println!("{line}");
        }
    }
}
