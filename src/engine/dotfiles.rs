//! Dotfile synchronisation from a git repository.

use super::steps::StepContext;
use crate::blueprint::DotfilesConfig;
use crate::command_runner::CommandRequest;
use crate::error::{ProvisionError, Result};
use std::path::{Component, Path, PathBuf};

/// Clone the configured repository into a scratch directory and mirror each
/// `src → dest` mapping. The scratch directory is removed on every exit path.
pub fn sync_dotfiles(ctx: &StepContext<'_>, dotfiles: &DotfilesConfig) -> Result<()> {
    ctx.log.line("Processing dotfiles...");
    let Some(repo) = dotfiles.repo() else {
        ctx.log.line("No dotfiles repo configured. Skipping.");
        return Ok(());
    };

    let scratch = tempfile::Builder::new()
        .prefix("dotwizard-dotfiles-")
        .tempdir()?;
    let checkout = scratch.path().join("repo");

    ctx.log.line(format!("Cloning {}...", repo));
    ctx.run(
        CommandRequest::new("git")
            .args(["clone", "--depth", "1", repo])
            .arg(checkout.to_string_lossy()),
    )
    .map_err(|e| ProvisionError::step(format!("failed to clone dotfiles: {}", e)))?;

    let base = match dotfiles.target_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => ctx.syncer.expand_home(dir.trim())?,
        _ => ctx
            .syncer
            .home()
            .map(Path::to_path_buf)
            .ok_or_else(|| ProvisionError::step("cannot determine the home directory"))?,
    };

    for mapping in &dotfiles.items {
        let src = checkout.join(relative_source(&mapping.src)?);
        let dest = resolve_destination(ctx, &base, &mapping.dest)?;

        ctx.log
            .line(format!("Installing configs to {}...", dest.display()));
        ctx.syncer
            .sync_tree(&src, &dest, ctx.log)
            .map_err(|e| ProvisionError::step(format!("failed to copy configs: {}", e)))?;
    }

    Ok(())
}

/// `src` as a path inside the checkout. Rejects anything that climbs out of it.
fn relative_source(src: &str) -> Result<PathBuf> {
    let path = Path::new(src.trim().trim_start_matches('/'));
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ProvisionError::step(format!(
            "dotfile source {} leaves the repository",
            src
        )));
    }
    Ok(path.to_path_buf())
}

fn resolve_destination(ctx: &StepContext<'_>, base: &Path, dest: &str) -> Result<PathBuf> {
    let expanded = ctx.syncer.expand_home(dest.trim())?;
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}
