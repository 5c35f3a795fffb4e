//! AUR helper bootstrap.
//!
//! When the helper is missing it is built from the AUR: prerequisites are installed
//! with pacman, the PKGBUILD is cloned into a scratch directory, `makepkg` builds it
//! unprivileged and the resulting package is installed with `pacman -U`.

use super::steps::StepContext;
use crate::command_runner::CommandRequest;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const AUR_BASE_URL: &str = "https://aur.archlinux.org";
const PACKAGE_SUFFIX: &str = ".pkg.tar.zst";

pub fn aur_clone_url(helper: &str) -> String {
    format!("{}/{}.git", AUR_BASE_URL, helper)
}

pub fn install_helper(ctx: &StepContext<'_>, helper: &str) -> Result<()> {
    if helper.is_empty() {
        return Err(ProvisionError::step("no AUR helper selected"));
    }

    ctx.log.line(format!("Checking for {}...", helper));
    if let Some(path) = ctx.runner.resolve(helper) {
        ctx.log
            .line(format!("{} is already installed ({}).", helper, path.display()));
        return Ok(());
    }

    ctx.log.line("Installing git and base-devel...");
    ctx.run_elevated(
        "pacman",
        ["-S", "--needed", "--noconfirm", "git", "base-devel"],
    )
    .map_err(|e| ProvisionError::step(format!("failed to install base-devel: {}", e)))?;

    let scratch = tempfile::Builder::new()
        .prefix("dotwizard-helper-")
        .tempdir()?;
    let build_dir = scratch.path().join(helper);

    ctx.log.line(format!("Cloning {}...", helper));
    ctx.run(
        CommandRequest::new("git")
            .args(["clone", "--depth", "1"])
            .arg(aur_clone_url(helper))
            .arg(build_dir.to_string_lossy()),
    )
    .map_err(|e| ProvisionError::step(format!("failed to clone {}: {}", helper, e)))?;

    ctx.log.line("Building package...");
    ctx.run(
        CommandRequest::new("makepkg")
            .args(["-sfc", "--noconfirm"])
            .current_dir(&build_dir),
    )
    .map_err(|e| ProvisionError::step(format!("build of {} failed: {}", helper, e)))?;

    let package = find_built_package(&build_dir)?;
    ctx.log.line("Installing built package...");
    ctx.run_elevated(
        "pacman",
        [
            "-U".to_string(),
            "--noconfirm".to_string(),
            package.to_string_lossy().into_owned(),
        ],
    )?;

    info!("Installed AUR helper {}", helper);
    Ok(())
}

/// The package archive `makepkg` left in `dir`, ignoring `-debug-` split packages.
pub fn find_built_package(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(PACKAGE_SUFFIX) && !name.contains("-debug-"))
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProvisionError::step(format!("no package found in {}", dir.display())))
}
