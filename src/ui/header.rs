//! Header and common widget rendering
//!
//! The ASCII logo, hint lines, the progress gauge and the scrolling log panel.

use crate::theme::{LogLevel, Styles, Theme};
use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

const LOGO: &[&str] = &[
    "     __      __               _                  __",
    " ___/ /___  / /__    __ ___  (_)__ ___ ________ / /",
    "/ _  / _ \\/ __/ |/|/ /  / / / _ `/ __/ _  / ",
    "\\_,_/\\___/\\__/|__,__/_/ /__/_/\\_,_/_/  \\_,_/  ",
];

/// Header renderer containing the ASCII art logo
pub struct HeaderRenderer {
    header_lines: Vec<Line<'static>>,
}

impl Default for HeaderRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRenderer {
    pub fn new() -> Self {
        Self {
            header_lines: Self::create_header(),
        }
    }

    /// Rows the logo needs, including a blank line below it.
    pub fn height(&self) -> u16 {
        self.header_lines.len() as u16 + 1
    }

    pub fn render_header(&self, f: &mut Frame, area: Rect) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let header = Paragraph::new(self.header_lines.clone())
            .block(Block::default().borders(Borders::NONE))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn create_header() -> Vec<Line<'static>> {
        LOGO.iter()
            .map(|row| Line::from(vec![Span::styled(*row, Styles::logo())]))
            .collect()
    }
}

/// Render a muted hint line
pub fn render_instructions(f: &mut Frame, area: Rect, text: &str) {
    let instructions = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Styles::nav_hint());
    f.render_widget(instructions, area);
}

/// Render the progress gauge; `progress` is a fraction in `[0, 1]`.
pub fn render_progress_bar(f: &mut Frame, area: Rect, progress: f32, label: &str) {
    let ratio = f64::from(progress.clamp(0.0, 1.0));
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title("Installation Progress"),
        )
        .gauge_style(Styles::progress())
        .ratio(ratio)
        .label(format!("{:>3.0}%  {}", ratio * 100.0, label));
    f.render_widget(gauge, area);
}

/// Render the visible window of `output`, `scroll` lines up from the bottom.
pub fn render_installer_output(f: &mut Frame, area: Rect, output: &[String], scroll: usize, title: &str) {
    let visible = area.height.saturating_sub(2) as usize;
    let end = output.len().saturating_sub(scroll);
    let start = end.saturating_sub(visible);

    let output_lines: Vec<Line> = output[start..end]
        .iter()
        .map(|line| Line::styled(line.clone(), Theme::log_style(LogLevel::classify(line))))
        .collect();

    let output_widget = Paragraph::new(output_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title(title.to_string()),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(output_widget, area);
}
