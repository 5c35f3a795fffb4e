//! Terminal setup and teardown.

use crate::error::{ProvisionError, Result};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};
use tracing::{info, warn};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard {
    terminal: Tui,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode()
            .map_err(|e| ProvisionError::terminal(format!("Failed to enable raw mode: {}", e)))?;
        if let Err(e) = crossterm::execute!(stdout(), EnterAlternateScreen) {
            restore();
            return Err(ProvisionError::terminal(format!(
                "Failed to enter alternate screen: {}",
                e
            )));
        }

        let backend = CrosstermBackend::new(stdout());
        match Terminal::new(backend) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                restore();
                Err(ProvisionError::terminal(format!("Failed to create terminal: {}", e)))
            }
        }
    }

    pub fn terminal(&mut self) -> &mut Tui {
        &mut self.terminal
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore();
        let _ = self.terminal.show_cursor();
    }
}

/// Leave the alternate screen and raw mode. Safe to call more than once.
pub fn restore() {
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), LeaveAlternateScreen);
}

/// Restore the terminal and exit with `128 + signal` on SIGTERM or SIGHUP.
/// Ctrl+C arrives as a key event in raw mode and is handled by the wizard.
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGTERM, SIGHUP])?;

    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                let signal_name = match sig {
                    SIGTERM => "SIGTERM",
                    SIGHUP => "SIGHUP",
                    _ => "UNKNOWN",
                };
                info!("Received {}, restoring terminal", signal_name);
                restore();
                std::process::exit(128 + sig);
            }
            warn!("signal iterator closed");
        })?;

    Ok(())
}
