//! Terminal styling for diff output.
//!
//! Color is a property of the [`Styler`] handed to the diff methods, never
//! ambient state, so the same comparer renders plain text in tests and
//! colored text on a terminal.

use colored::Colorize;

/// Glyph prefixed to passing resources.
pub const PASS_GLYPH: &str = "✓";
/// Glyph prefixed to failing resources.
pub const FAIL_GLYPH: &str = "×";
/// Glyph prefixed to unmatched resources that still pass.
pub const WARN_GLYPH: &str = "!";
/// Glyph prefixed to changes whose category has no ruleset section.
pub const UNKNOWN_GLYPH: &str = "?";

/// Applies (or skips) terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Styler {
    color: bool,
}

impl Default for Styler {
    fn default() -> Self {
        Self::colored()
    }
}

impl Styler {
    /// Creates a styler with color on or off.
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    /// Creates a styler that emits ANSI colors.
    #[must_use]
    pub const fn colored() -> Self {
        Self::new(true)
    }

    /// Creates a styler that emits plain text.
    #[must_use]
    pub const fn plain() -> Self {
        Self::new(false)
    }

    /// Red text.
    #[must_use]
    pub fn red(&self, text: &str) -> String {
        self.paint(text, |t| t.red().to_string())
    }

    /// Bold red text.
    #[must_use]
    pub fn red_bold(&self, text: &str) -> String {
        self.paint(text, |t| t.red().bold().to_string())
    }

    /// Yellow text.
    #[must_use]
    pub fn yellow(&self, text: &str) -> String {
        self.paint(text, |t| t.yellow().to_string())
    }

    /// Bold yellow text.
    #[must_use]
    pub fn yellow_bold(&self, text: &str) -> String {
        self.paint(text, |t| t.yellow().bold().to_string())
    }

    /// Green text.
    #[must_use]
    pub fn green(&self, text: &str) -> String {
        self.paint(text, |t| t.green().to_string())
    }

    /// The pass glyph.
    #[must_use]
    pub fn pass_glyph(&self) -> String {
        self.green(PASS_GLYPH)
    }

    /// The fail glyph.
    #[must_use]
    pub fn fail_glyph(&self) -> String {
        self.red(FAIL_GLYPH)
    }

    /// The warning glyph.
    #[must_use]
    pub fn warn_glyph(&self) -> String {
        self.yellow(WARN_GLYPH)
    }

    /// The glyph for changes no section covers.
    #[must_use]
    pub fn unknown_glyph(&self) -> String {
        self.yellow(UNKNOWN_GLYPH)
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.color {
            style(text)
        } else {
            text.to_string()
        }
    }
}
