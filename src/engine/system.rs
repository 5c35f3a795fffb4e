//! System configuration actions: display manager theme, default terminal, login shell.
//!
//! Each function returns an error for the caller to log; none of them abort the run.

use super::steps::StepContext;
use crate::command_runner::CommandRequest;
use crate::error::{ProvisionError, Result};
use crate::syncer::BACKUP_TIMESTAMP_FORMAT;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

const SDDM_THEME_REPO: &str = "https://github.com/uiriansan/SilentSDDM";
const SDDM_THEME_DIR: &str = "/usr/share/sddm/themes/silent";
const SDDM_FONT_DIR: &str = "/usr/share/fonts";
const SDDM_CONFIG: &str = "/etc/sddm.conf";
const SDDM_THEME_DEPS: &[&str] = &["qt6-svg", "qt6-virtualkeyboard", "qt6-multimedia-ffmpeg"];

pub const SDDM_CONFIG_BLOCK: &str = "[Theme]
Current=silent

[General]
InputMethod=qtvirtualkeyboard
GreeterEnvironment=QML2_IMPORT_PATH=/usr/share/sddm/themes/silent/components/,QT_IM_MODULE=qtvirtualkeyboard
";

/// Key binding rewritten to launch the chosen terminal.
pub const TERMINAL_BINDING_PREFIX: &str = "bind=ALT, Return, spawn,";

pub fn configure_display_manager(ctx: &StepContext<'_>) -> Result<()> {
    ctx.log.line("Installing SDDM theme dependencies...");
    let mut args = vec!["-S", "--needed", "--noconfirm"];
    args.extend_from_slice(SDDM_THEME_DEPS);
    ctx.run_elevated("pacman", args)
        .map_err(|e| ProvisionError::step(format!("failed to install sddm deps: {}", e)))?;

    let scratch = tempfile::Builder::new()
        .prefix("dotwizard-sddm-")
        .tempdir()?;
    let checkout = scratch.path().join("SilentSDDM");
    let checkout_str = checkout.to_string_lossy().into_owned();

    ctx.log.line("Cloning SilentSDDM theme...");
    ctx.run(
        CommandRequest::new("git")
            .args(["clone", "--depth", "1", SDDM_THEME_REPO])
            .arg(checkout_str.as_str()),
    )
    .map_err(|e| ProvisionError::step(format!("failed to clone theme repo: {}", e)))?;

    ctx.log.line("Installing theme files...");
    ctx.run_elevated("mkdir", ["-p", SDDM_THEME_DIR])?;
    ctx.run_elevated(
        "cp",
        [
            "-rf".to_string(),
            format!("{}/.", checkout_str),
            format!("{}/", SDDM_THEME_DIR),
        ],
    )?;

    if checkout.join("fonts").is_dir() {
        ctx.log.line("Installing fonts...");
        ctx.run_elevated("mkdir", ["-p", SDDM_FONT_DIR])?;
        ctx.run_elevated(
            "cp",
            [
                "-r".to_string(),
                format!("{}/fonts/.", checkout_str),
                format!("{}/", SDDM_FONT_DIR),
            ],
        )?;
    }

    if Path::new(SDDM_CONFIG).exists() {
        let stamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT);
        ctx.run_elevated(
            "cp",
            [
                "-a".to_string(),
                SDDM_CONFIG.to_string(),
                format!("{}.bak.{}", SDDM_CONFIG, stamp),
            ],
        )?;
    }

    ctx.log.line(format!("Writing {}...", SDDM_CONFIG));
    let mut staged = tempfile::NamedTempFile::new()?;
    staged.write_all(SDDM_CONFIG_BLOCK.as_bytes())?;
    staged.flush()?;
    ctx.run_elevated(
        "install",
        [
            "-m".to_string(),
            "644".to_string(),
            staged.path().to_string_lossy().into_owned(),
            SDDM_CONFIG.to_string(),
        ],
    )
    .map_err(|e| ProvisionError::step(format!("failed to write sddm config: {}", e)))?;

    ctx.log.line("Enabling SDDM service...");
    ctx.run_elevated("systemctl", ["enable", "sddm"])
}

/// Point the compositor's terminal binding at `terminal`.
pub fn patch_terminal(ctx: &StepContext<'_>, terminal: &str) -> Result<()> {
    ctx.log
        .line(format!("Patching default terminal to {}...", terminal));
    let path = ctx
        .syncer
        .expand_home(&ctx.blueprint.settings.terminal_config)?;

    let content = fs::read_to_string(&path).map_err(|e| {
        ProvisionError::step(format!("config file {} not readable: {}", path.display(), e))
    })?;

    let Some(patched) = patch_terminal_binding(&content, terminal) else {
        ctx.log.line(format!(
            "No terminal binding found in {}, leaving it unchanged.",
            path.display()
        ));
        return Ok(());
    };

    let mode = fs::metadata(&path)?.permissions().mode() & 0o7777;
    ctx.syncer.atomic_write(&path, patched.as_bytes(), mode)?;
    debug!("patched {}", path.display());
    Ok(())
}

/// Rewrite the first terminal binding line. `None` when there is none.
pub fn patch_terminal_binding(content: &str, terminal: &str) -> Option<String> {
    let mut replaced = false;
    let mut out = String::with_capacity(content.len() + terminal.len());
    for line in content.split_inclusive('\n') {
        if !replaced && line.trim_start().starts_with(TERMINAL_BINDING_PREFIX) {
            let newline = if line.ends_with('\n') { "\n" } else { "" };
            out.push_str(&format!("{} {}{}", TERMINAL_BINDING_PREFIX, terminal, newline));
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    replaced.then_some(out)
}

/// Make `shell` the invoking user's login shell.
pub fn change_shell(ctx: &StepContext<'_>, shell: &str) -> Result<()> {
    ctx.log.line(format!("Changing shell to {}...", shell));
    let path = ctx
        .runner
        .resolve(shell)
        .ok_or_else(|| ProvisionError::step(format!("shell {} not found", shell)))?;
    let user = current_user()
        .ok_or_else(|| ProvisionError::step("cannot determine the current user"))?;

    ctx.run_elevated(
        "chsh",
        [
            "-s".to_string(),
            path.to_string_lossy().into_owned(),
            user,
        ],
    )
}

fn current_user() -> Option<String> {
    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => Some(user.name),
        _ => std::env::var("USER").ok().filter(|name| !name.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_replaces_first_binding_only() {
        let content = "exec-once=waybar\nbind=ALT, Return, spawn, foot\nbind=ALT, Return, spawn, foot\n";
        let patched = patch_terminal_binding(content, "kitty").unwrap();
        assert_eq!(
            patched,
            "exec-once=waybar\nbind=ALT, Return, spawn, kitty\nbind=ALT, Return, spawn, foot\n"
        );
    }

    #[test]
    fn test_patch_handles_missing_trailing_newline() {
        let patched = patch_terminal_binding("bind=ALT, Return, spawn, alacritty", "foot").unwrap();
        assert_eq!(patched, "bind=ALT, Return, spawn, foot");
    }

    #[test]
    fn test_patch_without_binding() {
        assert_eq!(patch_terminal_binding("gaps=10\n", "kitty"), None);
    }

    #[test]
    fn test_sddm_block_selects_theme() {
        assert!(SDDM_CONFIG_BLOCK.starts_with("[Theme]\nCurrent=silent\n"));
        assert!(SDDM_CONFIG_BLOCK.contains("InputMethod=qtvirtualkeyboard"));
    }
}
