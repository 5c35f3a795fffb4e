//! Key mapping
//!
//! Translates crossterm key events into `WizardInput`. What a key means depends on
//! the screen: on the password prompt every printable key is text.

use crate::app::state::{WizardInput, WizardState};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Map a key press to wizard input. Releases and unbound keys give `None`.
pub fn map_key(key: KeyEvent, state: &WizardState) -> Option<WizardInput> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => Some(WizardInput::Interrupt),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Enter => return Some(WizardInput::Confirm),
        KeyCode::Esc => return Some(WizardInput::Back),
        KeyCode::Up => return Some(WizardInput::Up),
        KeyCode::Down => return Some(WizardInput::Down),
        _ => {}
    }

    match state {
        WizardState::Authenticating => match key.code {
            KeyCode::Char(c) => Some(WizardInput::Char(c)),
            KeyCode::Backspace => Some(WizardInput::Backspace),
            _ => None,
        },
        WizardState::Selection { .. } => match key.code {
            KeyCode::Char(' ') => Some(WizardInput::Toggle),
            KeyCode::Char('k') => Some(WizardInput::Up),
            KeyCode::Char('j') => Some(WizardInput::Down),
            _ => None,
        },
        WizardState::Installing => match key.code {
            KeyCode::Char('v') | KeyCode::Char('V') => Some(WizardInput::ToggleLogs),
            KeyCode::PageUp | KeyCode::Char('k') => Some(WizardInput::Up),
            KeyCode::PageDown | KeyCode::Char('j') => Some(WizardInput::Down),
            _ => None,
        },
        _ => None,
    }
}
