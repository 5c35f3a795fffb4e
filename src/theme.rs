//! Centralized theme and styling for the TUI
//!
//! One place for the palette, pre-built styles and fixed UI strings, so screens
//! never hardcode colors.
//!
//! # Usage
//! ```rust
//! use dotwizard::theme::{Colors, Styles};
//! use ratatui::style::Style;
//!
//! let style = Style::default().fg(Colors::PRIMARY);
//! let title_style = Styles::title();
//! ```

use ratatui::style::{Color, Modifier, Style};

// =============================================================================
// COLOR PALETTE
// =============================================================================

/// Core color palette (mauve accent on a dark base)
pub struct Colors;

impl Colors {
    // -------------------------------------------------------------------------
    // Base Colors
    // -------------------------------------------------------------------------

    /// Panel background
    pub const BG_PRIMARY: Color = Color::Rgb(30, 30, 46);

    /// Highlighted row background
    pub const BG_SURFACE: Color = Color::Rgb(49, 50, 68);

    /// Gauge background
    pub const BG_GAUGE: Color = Color::Rgb(49, 50, 68);

    /// Default foreground text color
    pub const FG_PRIMARY: Color = Color::Rgb(205, 214, 244);

    /// Secondary/muted text color
    pub const FG_MUTED: Color = Color::Rgb(166, 173, 200);

    // -------------------------------------------------------------------------
    // Accent Colors
    // -------------------------------------------------------------------------

    /// Borders, titles, logo
    pub const PRIMARY: Color = Color::Rgb(203, 166, 247);

    /// Description of the highlighted item
    pub const SECONDARY: Color = Color::Rgb(242, 205, 205);

    // -------------------------------------------------------------------------
    // Semantic Colors
    // -------------------------------------------------------------------------

    pub const SUCCESS: Color = Color::Rgb(166, 227, 161);

    pub const ERROR: Color = Color::Rgb(243, 139, 168);

    pub const WARNING: Color = Color::Rgb(245, 224, 220);

    /// Progress bar fill
    pub const PROGRESS: Color = Color::Rgb(203, 166, 247);
}

// =============================================================================
// PRE-BUILT STYLES
// =============================================================================

pub struct Styles;

impl Styles {
    pub fn text() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }

    /// Screen titles and headings
    pub fn title() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn logo() -> Style {
        Style::default().fg(Colors::PRIMARY)
    }

    pub fn border() -> Style {
        Style::default().fg(Colors::PRIMARY)
    }

    /// Highlighted list row
    pub fn selected() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .bg(Colors::BG_SURFACE)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_desc() -> Style {
        Style::default().fg(Colors::SECONDARY).bg(Colors::BG_SURFACE)
    }

    pub fn unselected() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn success() -> Style {
        Style::default()
            .fg(Colors::SUCCESS)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warning() -> Style {
        Style::default().fg(Colors::WARNING)
    }

    pub fn error() -> Style {
        Style::default().fg(Colors::ERROR)
    }

    pub fn progress() -> Style {
        Style::default().fg(Colors::PROGRESS).bg(Colors::BG_GAUGE)
    }

    pub fn nav_hint() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }
}

// =============================================================================
// SEMANTIC STYLING
// =============================================================================

/// Severity of a pipeline log line, judged from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn classify(line: &str) -> Self {
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("error") || lower.contains(" failed") {
            Self::Error
        } else if lower.starts_with("warning") || lower.contains("skipping") {
            Self::Warning
        } else {
            Self::Info
        }
    }
}

pub struct Theme;

impl Theme {
    pub fn log_style(level: LogLevel) -> Style {
        match level {
            LogLevel::Info => Styles::text(),
            LogLevel::Warning => Styles::warning(),
            LogLevel::Error => Styles::error(),
        }
    }
}

// =============================================================================
// UI TEXT
// =============================================================================

pub struct UiText;

impl UiText {
    pub const WELCOME: &'static str = "Welcome to the dotwizard setup engine";
    pub const PRESS_ENTER_START: &'static str = "Press Enter to Start Configuration";
    pub const SELECT_NEXT: &'static str = "[Space] select  [Enter] next step  [Esc] back";
    pub const SELECT_SKIP: &'static str = "[Space] select  [Enter] skip this step  [Esc] back";
    pub const CONFIRM_HINT: &'static str = "[Enter] confirm  [Esc] back  [Ctrl+C] cancel";
    pub const AUTH_PROMPT: &'static str = "Authentication required to proceed with installation.";
    pub const AUTH_HINT: &'static str = "[Enter] submit  [Esc] back";
    pub const VERIFYING: &'static str = "Verifying...";
    pub const SHOW_LOGS: &'static str = "(Press 'V' to view verbose logs)";
    pub const HIDE_LOGS: &'static str = "Installation Logs ('V' to hide, Up/Down to scroll)";
    pub const COMPLETE: &'static str = "Installation Complete!";
    pub const PRESS_ENTER_EXIT: &'static str = "Press Enter to Exit";
    pub const FAILED_HINT: &'static str = "Installation failed. Press Ctrl+C to exit.";
}
