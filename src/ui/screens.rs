//! Wizard screens, one render function per `WizardState`.
//!
//! Each function draws into the content area below the logo.

use super::header::{render_installer_output, render_instructions, render_progress_bar};
use crate::app::state::Wizard;
use crate::blueprint::{SelectionMode, Step};
use crate::theme::{Styles, UiText};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

pub fn render_welcome(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::styled(UiText::WELCOME, Styles::text()),
        Line::from(""),
        Line::styled(UiText::PRESS_ENTER_START, Styles::nav_hint()),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

/// Checkbox list for one blueprint step. The highlighted row shows its description.
pub fn render_selection(f: &mut Frame, area: Rect, wizard: &Wizard, index: usize) {
    let Some(step) = wizard.blueprint().steps.get(index) else {
        return;
    };
    let total = wizard.blueprint().steps.len();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title
            Constraint::Min(3),    // Items
            Constraint::Length(1), // Notice
            Constraint::Length(1), // Instructions
        ])
        .split(area);

    let title = Paragraph::new(format!("Step {}/{}: {}", index + 1, total, step.title))
        .style(Styles::title())
        .alignment(Alignment::Left);
    f.render_widget(title, chunks[0]);

    let items = step_items(step, wizard.cursor());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::LEFT)
                .border_style(Styles::border()),
        )
        .highlight_style(Styles::selected());
    let mut list_state = ListState::default();
    list_state.select(Some(wizard.cursor()));
    f.render_stateful_widget(list, chunks[1], &mut list_state);

    if let Some(notice) = wizard.notice() {
        let notice = Paragraph::new(notice)
            .style(Styles::error())
            .alignment(Alignment::Center);
        f.render_widget(notice, chunks[2]);
    }

    let hint = if step.has_selection() {
        UiText::SELECT_NEXT
    } else {
        UiText::SELECT_SKIP
    };
    render_instructions(f, chunks[3], hint);
}

fn step_items(step: &Step, cursor: usize) -> Vec<ListItem<'static>> {
    step.items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let check = match (step.mode, item.selected) {
                (SelectionMode::Single, true) => "(•)",
                (SelectionMode::Single, false) => "( )",
                (SelectionMode::Multi, true) => "[x]",
                (SelectionMode::Multi, false) => "[ ]",
            };
            let mut lines = vec![Line::from(format!("{} {}", check, item.display_name()))];
            let desc_style = if i == cursor {
                Styles::selected_desc()
            } else {
                Styles::text_muted()
            };
            lines.push(Line::styled(format!("    {}", item.description), desc_style));
            ListItem::new(lines).style(Styles::unselected())
        })
        .collect()
}

pub fn render_confirmation(f: &mut Frame, area: Rect, wizard: &Wizard) {
    let mut lines = vec![
        Line::styled("Summary of Changes:", Styles::title()),
        Line::from(""),
    ];
    lines.extend(
        wizard
            .summary()
            .into_iter()
            .map(|entry| Line::styled(format!("• {}", entry), Styles::text())),
    );
    lines.push(Line::from(""));
    lines.push(Line::styled(UiText::CONFIRM_HINT, Styles::nav_hint()));

    let summary = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });
    f.render_widget(summary, area);
}

pub fn render_authentication(f: &mut Frame, area: Rect, wizard: &Wizard) {
    let input = if wizard.is_verifying() {
        Span::styled(UiText::VERIFYING, Styles::warning())
    } else {
        Span::styled(format!("> {}", wizard.masked_password()), Styles::text())
    };

    let mut lines = vec![
        Line::styled("Configuration Complete.", Styles::title()),
        Line::styled(UiText::AUTH_PROMPT, Styles::text()),
        Line::from(""),
        Line::from(input),
        Line::from(""),
    ];
    if let Some(notice) = wizard.notice() {
        lines.push(Line::styled(notice.to_string(), Styles::error()));
    }
    lines.push(Line::styled(UiText::AUTH_HINT, Styles::nav_hint()));

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

/// Progress view, or the full log panel when toggled.
pub fn render_installing(f: &mut Frame, area: Rect, wizard: &Wizard) {
    if wizard.show_logs() {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        render_installer_output(
            f,
            chunks[0],
            wizard.logs(),
            wizard.log_scroll(),
            UiText::HIDE_LOGS,
        );
        if wizard.failure().is_some() {
            let hint = Paragraph::new(UiText::FAILED_HINT)
                .style(Styles::error())
                .alignment(Alignment::Center);
            f.render_widget(hint, chunks[1]);
        }
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Status
            Constraint::Length(3), // Gauge
            Constraint::Length(1), // Spacer
            Constraint::Length(1), // Hint
            Constraint::Min(0),
        ])
        .split(area);

    let status = Paragraph::new(wizard.status().to_string())
        .style(Styles::text())
        .alignment(Alignment::Center);
    f.render_widget(status, chunks[0]);
    render_progress_bar(f, chunks[1], wizard.progress(), "");
    render_instructions(f, chunks[3], UiText::SHOW_LOGS);
}

pub fn render_done(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::styled(UiText::COMPLETE, Styles::success()),
        Line::from(""),
        Line::styled(UiText::PRESS_ENTER_EXIT, Styles::nav_hint()),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}
