//! dotwizard - Main entry point

use anyhow::{Context, Result};
use dotwizard::app::{terminal, App};
use dotwizard::blueprint::Blueprint;
use dotwizard::cli::Cli;
use dotwizard::command_runner::{CommandRunner, SystemRunner};
use dotwizard::privilege::{PrivilegeSession, SessionMode};
use dotwizard::root_setup;
use dotwizard::syncer::FileSyncer;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Log to a file; the terminal belongs to the TUI. `RUST_LOG` overrides the level.
fn init_logger(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {}", e))?;
    Ok(())
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dotwizard")
        .join("dotwizard.log")
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let log_path = cli.log_file.clone().unwrap_or_else(default_log_path);
    if let Err(e) = init_logger(&log_path) {
        eprintln!("warning: logging disabled: {:#}", e);
    }
    info!("dotwizard starting up");

    let result = if cli.root_setup {
        run_root_setup()
    } else {
        run_wizard(&cli)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_root_setup() -> Result<()> {
    root_setup::configure_sudo_timestamp().context("root setup failed")?;
    println!("✓ sudo stays authenticated until the next reboot");
    println!("  Run dotwizard --passwordless as your normal user.");
    Ok(())
}

fn run_wizard(cli: &Cli) -> Result<()> {
    let blueprint = Blueprint::load(&cli.config)
        .with_context(|| format!("failed to load blueprint {}", cli.config.display()))?;
    debug!("blueprint loaded with {} steps", blueprint.steps.len());

    let mode = if cli.passwordless {
        SessionMode::Passwordless
    } else {
        blueprint.settings.privilege.mode
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let session = PrivilegeSession::with_refresh_interval(
        Arc::clone(&runner),
        mode,
        blueprint.settings.privilege.refresh_interval(),
    );

    if mode == SessionMode::Passwordless {
        session
            .probe()
            .context("passwordless mode needs `sudo -n` to work (see --root-setup)")?;
        info!("passwordless sudo available");
    }

    if let Err(e) = terminal::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let mut guard = terminal::TerminalGuard::enter().context("terminal setup failed")?;
    let mut app = App::new(blueprint, session, runner, FileSyncer::new());
    let result = app.run(guard.terminal());
    drop(guard);

    result.context("wizard terminated with an error")?;
    if let Some(failure) = app.wizard().failure() {
        warn!("exited after a failed installation: {}", failure);
    }
    Ok(())
}
