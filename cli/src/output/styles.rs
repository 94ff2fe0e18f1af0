//! Terminal stylesheet. Everything stays unstyled until `colorize` runs.

use owo_colors::Style;
use vmops_common::PowerState;

/// Colors for messages, headers and instance power states.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    pub dim: Style,
    pub bold: Style,
    /// Section titles such as the instance name in `vmops info`.
    pub header: Style,
    pub running: Style,
    pub stopped: Style,
    pub suspended: Style,
}

impl Styles {
    /// Enable colors.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.running = Style::new().green().bold();
        self.stopped = Style::new().dimmed();
        self.suspended = Style::new().yellow();
    }

    /// Style for an instance in `state`.
    #[must_use]
    pub fn power(&self, state: PowerState) -> Style {
        match state {
            PowerState::PoweredOn => self.running,
            PowerState::PoweredOff => self.stopped,
            PowerState::Suspended => self.suspended,
        }
    }
}
