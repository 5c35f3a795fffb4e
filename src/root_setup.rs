//! One-shot sudoers bootstrap (`dotwizard --root-setup`).
//!
//! Installs a drop-in that keeps the sudo timestamp valid until reboot, so a later
//! wizard run can use passwordless mode. The file is checked with `visudo -cf`
//! before it is trusted; if anything fails after it was written, it is removed.

use crate::command_runner::{CommandRequest, CommandRunner, LogSink, SystemRunner};
use crate::error::{ProvisionError, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::{info, warn};

pub const SUDOERS_DROPIN: &str = "/etc/sudoers.d/99-no-password-until-reboot";
pub const SUDOERS_CONTENT: &str = "Defaults timestamp_timeout=-1\n";
pub const SUDOERS_MODE: u32 = 0o440;

/// Install the drop-in at its standard location. Must run as root.
pub fn configure_sudo_timestamp() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        return Err(ProvisionError::authentication(
            "this mode must be run as root",
        ));
    }

    let runner = SystemRunner::new();
    install_dropin(Path::new(SUDOERS_DROPIN), SUDOERS_CONTENT, |path| {
        visudo_check(&runner, path)
    })?;
    info!("sudo timestamp timeout set to -1 until reboot");
    Ok(())
}

/// Write `content` to `path` with mode 0440 and run `validate` on it. The file is
/// deleted if setting permissions or validation fails.
pub fn install_dropin<F>(path: &Path, content: &str, validate: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    write_dropin(path, content)?;

    let checked = fs::set_permissions(path, fs::Permissions::from_mode(SUDOERS_MODE))
        .map_err(ProvisionError::from)
        .and_then(|()| validate(path));

    if let Err(e) = checked {
        if let Err(remove_err) = fs::remove_file(path) {
            warn!("could not remove {}: {}", path.display(), remove_err);
        }
        return Err(e);
    }
    Ok(())
}

fn write_dropin(path: &Path, content: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SUDOERS_MODE)
        .open(path)
        .map_err(|e| {
            ProvisionError::step(format!("failed to write {}: {}", path.display(), e))
        })?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// `visudo -cf <path>`; the checker's output becomes the error message.
pub fn visudo_check(runner: &dyn CommandRunner, path: &Path) -> Result<()> {
    let (sink, lines) = LogSink::collector();
    let request = CommandRequest::new("visudo")
        .arg("-cf")
        .arg(path.to_string_lossy());
    runner.run(&sink, &request).map_err(|e| {
        let output = lines.lock().map(|l| l.join("\n")).unwrap_or_default();
        ProvisionError::validation(format!("visudo rejected {}: {} {}", path.display(), e, output))
    })
}
