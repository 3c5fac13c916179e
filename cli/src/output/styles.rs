//! Line marks and their owo-colors styles.

use owo_colors::Style;

/// Kind of line the build prints. Each kind has a fixed glyph and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// A build stage starting.
    Stage,
    /// A stage or the whole build finished.
    Done,
    /// A tolerated failure.
    Warn,
    /// The fatal error ending the run.
    Fail,
    /// Extra context, e.g. a reused base image.
    Note,
}

impl Mark {
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Stage => "→",
            Self::Done => "✓",
            Self::Warn => "⚠",
            Self::Fail => "✗",
            Self::Note => "ℹ",
        }
    }

    /// Warnings and failures go to stderr and are printed even with `--quiet`.
    #[must_use]
    pub const fn is_diagnostic(self) -> bool {
        matches!(self, Self::Warn | Self::Fail)
    }
}

/// Stylesheet for build output. Plain until [`Styles::colorize`] is called.
#[derive(Default, Clone)]
pub struct Styles {
    pub stage: Style,
    pub done: Style,
    pub warn: Style,
    pub fail: Style,
    pub note: Style,
    /// Keys of the plan and summary tables.
    pub key: Style,
    /// Section titles.
    pub title: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.stage = Style::new().cyan();
        self.done = Style::new().green();
        self.warn = Style::new().yellow();
        self.fail = Style::new().red().bold();
        self.note = Style::new().blue();
        self.key = Style::new().dimmed();
        self.title = Style::new().bold().cyan();
    }

    #[must_use]
    pub fn for_mark(&self, mark: Mark) -> Style {
        match mark {
            Mark::Stage => self.stage,
            Mark::Done => self.done,
            Mark::Warn => self.warn,
            Mark::Fail => self.fail,
            Mark::Note => self.note,
        }
    }
}
