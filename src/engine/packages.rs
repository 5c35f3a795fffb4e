//! Package set resolution and the batched helper install.

use super::steps::StepContext;
use crate::blueprint::Blueprint;
use crate::command_runner::CommandRequest;
use crate::error::Result;
use std::collections::HashSet;

/// Base packages followed by every selected item name, deduplicated in first-seen
/// order. Blank names are dropped.
pub fn package_set(blueprint: &Blueprint) -> Vec<String> {
    let mut seen = HashSet::new();
    blueprint
        .settings
        .base_packages
        .iter()
        .map(String::as_str)
        .chain(blueprint.selected_items().map(|(_, item)| item.name.as_str()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// One `<helper> -S --noconfirm --needed …` invocation for the whole set.
///
/// The helper runs unprivileged; it escalates through sudo itself, relying on the
/// timestamp the privilege session keeps warm.
pub fn install_packages(ctx: &StepContext<'_>, helper: &str, packages: &[String]) -> Result<()> {
    if packages.is_empty() {
        ctx.log.line("No packages to install.");
        return Ok(());
    }

    ctx.log.line(format!(
        "Installing {} packages using {}...",
        packages.len(),
        helper
    ));
    ctx.run(
        CommandRequest::new(helper)
            .args(["-S", "--noconfirm", "--needed"])
            .args(packages.iter().cloned()),
    )
}
