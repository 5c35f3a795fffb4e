//! User interface rendering module
//!
//! - `header` - logo, hint lines, progress gauge and log panel
//! - `screens` - one screen per wizard state

mod header;
pub mod screens;

use crate::app::state::{Wizard, WizardState};
use crate::theme::Styles;
use header::HeaderRenderer;
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin},
    widgets::{Block, BorderType, Borders},
    Frame,
};

pub struct UiRenderer {
    header: HeaderRenderer,
}

impl Default for UiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl UiRenderer {
    pub fn new() -> Self {
        Self {
            header: HeaderRenderer::new(),
        }
    }

    /// Render the whole frame for the wizard's current state.
    pub fn render(&self, f: &mut Frame, wizard: &Wizard) {
        let state = wizard.state();
        let container = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Styles::border())
            .title(format!(" {} ", state.title()))
            .title_style(Styles::title());
        let outer = f.area();
        f.render_widget(container, outer);

        let inner = outer.inner(Margin {
            horizontal: 2,
            vertical: 1,
        });
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.header.height()),
                Constraint::Min(1),
            ])
            .split(inner);

        self.header.render_header(f, chunks[0]);
        let content = chunks[1];

        match state {
            WizardState::Welcome => screens::render_welcome(f, content),
            WizardState::Selection { step } => {
                screens::render_selection(f, content, wizard, step)
            }
            WizardState::Confirmation => screens::render_confirmation(f, content, wizard),
            WizardState::Authenticating => screens::render_authentication(f, content, wizard),
            WizardState::Installing => screens::render_installing(f, content, wizard),
            WizardState::Done => screens::render_done(f, content),
        }
    }
}
